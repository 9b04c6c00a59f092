mod common;

use std::time::Duration;

use {
    futures::{SinkExt, StreamExt},
    tokio::time::timeout,
    tokio_tungstenite::{connect_async, tungstenite::Message},
};

use common::{obtain_token, spawn_app};

#[tokio::test]
async fn valid_token_admits_the_socket_to_broadcasts() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = obtain_token(&app, &client).await;

    let (mut socket, _) = connect_async(app.ws_url()).await.unwrap();
    socket
        .send(Message::binary(token.clone().into_bytes()))
        .await
        .unwrap();
    app.wait_for_sockets(1).await;

    app.registry.broadcast(br#"{"event":"ping"}"#);

    let frame = timeout(Duration::from_secs(5), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(frame, Message::text(r#"{"event":"ping"}"#));
}

#[tokio::test]
async fn broadcast_reaches_every_admitted_socket() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = obtain_token(&app, &client).await;

    let (mut first, _) = connect_async(app.ws_url()).await.unwrap();
    first
        .send(Message::binary(token.clone().into_bytes()))
        .await
        .unwrap();
    let (mut second, _) = connect_async(app.ws_url()).await.unwrap();
    second
        .send(Message::binary(token.into_bytes()))
        .await
        .unwrap();
    app.wait_for_sockets(2).await;

    app.registry.broadcast(b"update");

    for socket in [&mut first, &mut second] {
        let frame = timeout(Duration::from_secs(5), socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(frame, Message::text("update"));
    }
}

#[tokio::test]
async fn invalid_token_is_never_admitted() {
    let app = spawn_app().await;

    let (mut socket, _) = connect_async(app.ws_url()).await.unwrap();
    socket
        .send(Message::binary(b"garbage".to_vec()))
        .await
        .unwrap();

    // The server closes the connection without admitting it.
    loop {
        match timeout(Duration::from_secs(5), socket.next()).await.unwrap() {
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
            Some(Ok(other)) => panic!("unexpected frame after bad token: {other:?}"),
        }
    }
    assert_eq!(app.state.hub.count(), 0);
}

#[tokio::test]
async fn closed_socket_leaves_the_broadcast_set() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = obtain_token(&app, &client).await;

    let (mut socket, _) = connect_async(app.ws_url()).await.unwrap();
    socket
        .send(Message::binary(token.into_bytes()))
        .await
        .unwrap();
    app.wait_for_sockets(1).await;

    socket.close(None).await.unwrap();
    app.wait_for_sockets(0).await;
}
