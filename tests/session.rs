mod support;

use tank_battle_server::game::{
    ControlUpdate, GameEventKind, GameStatus, SessionCommand, SessionMsg,
};
use tokio_test::{assert_err, assert_ok};

fn join(id: &str) -> SessionCommand {
    SessionCommand::Join {
        player_id: id.to_string(),
        name: format!("player {id}"),
    }
}

#[tokio::test]
async fn session_broadcasts_snapshots_and_events() {
    let (handle, mut rx, task) = support::spawn_session(support::session_settings(21));

    assert_ok!(handle.send(join("p1")).await);
    assert_ok!(handle.send(SessionCommand::Start).await);

    let joined = support::recv_until(&mut rx, |msg| match msg {
        SessionMsg::Event { event } => match event.kind {
            GameEventKind::PlayerJoined { player_id, .. } => Some(player_id),
            _ => None,
        },
        _ => None,
    })
    .await;
    assert_eq!(joined, "p1");

    let snapshot = support::recv_until(&mut rx, |msg| match msg {
        SessionMsg::Snapshot { snapshot } if snapshot.status == GameStatus::Running => Some(snapshot),
        _ => None,
    })
    .await;
    assert_eq!(snapshot.tanks.len(), 1);
    assert_eq!(handle.player_count(), 1);

    let json = serde_json::to_value(&SessionMsg::Snapshot { snapshot }).unwrap();
    assert_eq!(json["type"], "snapshot");
    assert!(json["snapshot"]["tanks"][0]["position"]["x"].is_number());

    assert_ok!(handle.send(SessionCommand::Shutdown).await);
    let reason = support::recv_until(&mut rx, |msg| match msg {
        SessionMsg::GameEnded { reason, .. } => Some(reason),
        _ => None,
    })
    .await;
    assert_eq!(reason, "shutdown");
    assert_ok!(task.await);
}

#[tokio::test]
async fn controls_drive_the_tank() {
    let (handle, mut rx, task) = support::spawn_session(support::session_settings(22));
    assert_ok!(handle.send(join("p1")).await);
    assert_ok!(handle.send(SessionCommand::Start).await);
    assert_ok!(
        handle
            .send(SessionCommand::Controls {
                player_id: "p1".into(),
                update: ControlUpdate {
                    fire: Some(true),
                    ..ControlUpdate::default()
                },
            })
            .await
    );

    let owner = support::recv_until(&mut rx, |msg| match msg {
        SessionMsg::Event { event } => match event.kind {
            GameEventKind::ProjectileFired { owner_id, .. } => Some(owner_id),
            _ => None,
        },
        _ => None,
    })
    .await;
    assert_eq!(owner, "p1");

    assert_ok!(handle.send(SessionCommand::Shutdown).await);
    assert_ok!(task.await);
}

#[tokio::test]
async fn time_limit_finishes_the_session() {
    let mut settings = support::session_settings(23);
    settings.game.time_limit = Some(200.0);
    let (handle, mut rx, task) = support::spawn_session(settings);
    assert_ok!(handle.send(join("p1")).await);
    assert_ok!(handle.send(SessionCommand::Start).await);

    let (reason, winner) = support::recv_until(&mut rx, |msg| match msg {
        SessionMsg::GameEnded { reason, winner, .. } => Some((reason, winner)),
        _ => None,
    })
    .await;
    assert_eq!(reason, "time_limit");
    assert_eq!(winner.as_deref(), Some("p1"));

    assert_ok!(task.await);
    assert_err!(handle.send(SessionCommand::Start).await);
    assert!(handle.is_closed());
}

#[tokio::test]
async fn paused_session_holds_the_clock() {
    let (handle, mut rx, task) = support::spawn_session(support::session_settings(24));
    assert_ok!(handle.send(SessionCommand::Start).await);
    assert_ok!(handle.send(SessionCommand::Pause).await);

    let first = support::recv_until(&mut rx, |msg| match msg {
        SessionMsg::Snapshot { snapshot } if snapshot.status == GameStatus::Paused => {
            Some(snapshot.timestamp)
        }
        _ => None,
    })
    .await;
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    let later = support::recv_until(&mut rx, |msg| match msg {
        SessionMsg::Snapshot { snapshot } => Some(snapshot.timestamp),
        _ => None,
    })
    .await;
    assert_eq!(first, later);

    assert_ok!(handle.send(SessionCommand::Resume).await);
    assert_ok!(handle.send(SessionCommand::End { reason: "manual".into() }).await);
    let reason = support::recv_until(&mut rx, |msg| match msg {
        SessionMsg::GameEnded { reason, .. } => Some(reason),
        _ => None,
    })
    .await;
    assert_eq!(reason, "manual");
    assert_ok!(task.await);
}

#[tokio::test]
async fn dropping_every_handle_stops_the_session() {
    let (handle, mut rx, task) = support::spawn_session(support::session_settings(25));
    drop(handle);
    let reason = support::recv_until(&mut rx, |msg| match msg {
        SessionMsg::GameEnded { reason, .. } => Some(reason),
        _ => None,
    })
    .await;
    assert_eq!(reason, "shutdown");
    assert_ok!(task.await);
}
