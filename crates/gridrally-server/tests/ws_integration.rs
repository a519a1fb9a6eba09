mod common;

use common::{TestServer, ws_connect, ws_join, ws_read_server_msg, ws_send, ws_wait_for_events};

use gridrally_core::events::{GameEvent, GamePhase};
use gridrally_core::net::messages::{
    ClientMessage, JoinMsg, SelectCourseMsg, ServerMessage, SetReadyMsg,
};
use gridrally_core::net::protocol::PROTOCOL_VERSION;

#[tokio::test]
async fn join_handshake() {
    let server = TestServer::new().await;
    let mut ws = ws_connect(&server.ws_url()).await;

    let resp = ws_join(&mut ws, "Alice").await;
    assert_eq!(resp.player_id, 1);
    assert!(!resp.session_token.is_empty());
    assert!(resp.available_courses.contains(&"DizzyHighway".to_string()));

    // The lobby roster follows the join response.
    match ws_read_server_msg(&mut ws).await {
        ServerMessage::PlayerList(list) => {
            assert_eq!(list.players.len(), 1);
            assert_eq!(list.players[0].display_name, "Alice");
            assert!(!list.players[0].is_ready);
        },
        other => panic!("expected PlayerList, got: {other:?}"),
    }
}

#[tokio::test]
async fn second_join_updates_every_roster() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    let resp = ws_join(&mut alice, "Alice").await;
    assert_eq!(resp.player_id, 1);
    let _ = ws_read_server_msg(&mut alice).await; // roster with just Alice

    let mut bob = ws_connect(&server.ws_url()).await;
    let resp = ws_join(&mut bob, "Bob").await;
    assert_eq!(resp.player_id, 2);

    for ws in [&mut alice, &mut bob] {
        match ws_read_server_msg(ws).await {
            ServerMessage::PlayerList(list) => {
                let names: Vec<_> = list.players.iter().map(|p| p.display_name.as_str()).collect();
                assert_eq!(names, ["Alice", "Bob"]);
            },
            other => panic!("expected PlayerList, got: {other:?}"),
        }
    }
}

#[tokio::test]
async fn duplicate_name_is_rejected() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    ws_join(&mut alice, "Alice").await;

    let mut impostor = ws_connect(&server.ws_url()).await;
    ws_send(
        &mut impostor,
        &ClientMessage::Join(JoinMsg {
            player_name: "Alice".to_string(),
            figure: 1,
            is_bot: false,
            protocol_version: PROTOCOL_VERSION,
        }),
    )
    .await;

    match ws_read_server_msg(&mut impostor).await {
        ServerMessage::Error(err) => assert!(err.message.contains("taken"), "{}", err.message),
        other => panic!("expected Error, got: {other:?}"),
    }
}

#[tokio::test]
async fn blank_name_is_rejected() {
    let server = TestServer::new().await;
    let mut ws = ws_connect(&server.ws_url()).await;

    ws_send(
        &mut ws,
        &ClientMessage::Join(JoinMsg {
            player_name: "   ".to_string(),
            figure: 0,
            is_bot: false,
            protocol_version: PROTOCOL_VERSION,
        }),
    )
    .await;

    match ws_read_server_msg(&mut ws).await {
        ServerMessage::Error(_) => (),
        other => panic!("expected Error, got: {other:?}"),
    }
}

#[tokio::test]
async fn protocol_mismatch_is_rejected() {
    let server = TestServer::new().await;
    let mut ws = ws_connect(&server.ws_url()).await;

    ws_send(
        &mut ws,
        &ClientMessage::Join(JoinMsg {
            player_name: "Alice".to_string(),
            figure: 0,
            is_bot: false,
            protocol_version: 99,
        }),
    )
    .await;

    match ws_read_server_msg(&mut ws).await {
        ServerMessage::Error(err) => {
            assert!(err.message.contains("Protocol version"), "{}", err.message);
        },
        other => panic!("expected Error, got: {other:?}"),
    }
}

#[tokio::test]
async fn ready_players_start_a_game() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    ws_join(&mut alice, "Alice").await;
    let mut bob = ws_connect(&server.ws_url()).await;
    ws_join(&mut bob, "Bob").await;

    ws_send(
        &mut alice,
        &ClientMessage::SelectCourse(SelectCourseMsg {
            course: "DizzyHighway".to_string(),
        }),
    )
    .await;
    for ws in [&mut alice, &mut bob] {
        ws_send(ws, &ClientMessage::SetReady(SetReadyMsg { ready: true })).await;
    }

    // Both clients see the game open with the setup phase.
    for ws in [&mut alice, &mut bob] {
        let events = ws_wait_for_events(ws).await;
        assert_eq!(
            events.first(),
            Some(&GameEvent::ActivePhase {
                phase: GamePhase::Setup
            })
        );
    }
}
