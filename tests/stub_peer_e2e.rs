//! End-to-end tests against the real `bridge-stub-peer` executable.
//!
//! These go through the full launch contract: bind, spawn with the port as
//! the last argument, accept, exchange, close and reap.

use std::time::Duration;

use lockstep_bridge::{
    Action, ActionEncoding, Controls, Environment, Error, PeerCommand, Session, SessionConfig,
    SessionState,
};

const STUB_PEER: &str = env!("CARGO_BIN_EXE_bridge-stub-peer");

fn stub(args: &[&str]) -> SessionConfig {
    SessionConfig::for_peer(PeerCommand::native(STUB_PEER).with_args(args.iter().copied()))
        .with_accept_timeout_ms(10_000)
}

#[tokio::test]
async fn test_gray_frame_through_real_peer() {
    let mut session = Session::launch(stub(&["--gray", "128", "--reward", "1.5"]))
        .await
        .unwrap();
    assert!(session.pid().is_some());
    assert_eq!(session.state(), SessionState::Ready);

    let first = session.reset().await.unwrap();
    assert!(first.is_zeroed());

    let result = session.step(5).await.unwrap();
    assert!(result.observation.as_slice().iter().all(|&v| v == 128));
    assert_eq!(result.reward, 1.5);
    assert!(!result.done);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_episode_end_and_reset() {
    let mut session = Session::builder()
        .program(STUB_PEER)
        .args(["--episode-len", "2", "--echo-action"])
        .accept_timeout(Duration::from_secs(10))
        .launch()
        .await
        .unwrap();

    assert!(!session.step(7).await.unwrap().done);
    let second = session.step(9).await.unwrap();
    assert!(second.done);
    assert!(second.observation.as_slice().iter().all(|&v| v == 9));

    // Still usable after done; reset sends the no-op action, echoed as 0
    assert_eq!(session.state(), SessionState::Ready);
    let observation = session.reset().await.unwrap();
    assert!(observation.is_zeroed());
    assert_eq!(session.steps(), 2);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_bitmask_session_via_trait() {
    let config = stub(&["--echo-action"]).with_encoding(ActionEncoding::Bitmask);
    let mut env: Box<dyn Environment> = Box::new(Session::launch(config).await.unwrap());

    let action = Action::Controls(Controls::RIGHT | Controls::FOCUS);
    let result = env.step(action).await.unwrap();
    assert!(result.observation.as_slice().iter().all(|&v| v == 0x18));

    assert!(matches!(
        env.step(Action::Index(1)).await,
        Err(Error::InvalidArgument { .. })
    ));
}

#[tokio::test]
async fn test_peer_rejecting_arguments_is_reported() {
    let err = Session::launch(stub(&["--no-such-flag"])).await.unwrap_err();
    assert!(matches!(err, Error::PeerExited { .. }), "got {err}");
}

#[tokio::test]
async fn test_parallel_sessions() {
    let configs = [
        stub(&["--gray", "10"]),
        stub(&["--gray", "20"]),
        stub(&["--gray", "30"]),
    ];

    let mut handles = Vec::new();
    for (i, config) in configs.into_iter().enumerate() {
        handles.push(tokio::spawn(async move {
            let mut session = Session::launch(config).await?;
            let mut last = None;
            for _ in 0..5 {
                last = Some(session.step(1).await?);
            }
            session.close().await?;
            Ok::<_, Error>((i, last))
        }));
    }

    for handle in handles {
        let (i, last) = handle.await.unwrap().unwrap();
        let expected = 10 * (i as u8 + 1);
        let last = last.unwrap();
        assert!(last.observation.as_slice().iter().all(|&v| v == expected));
    }
}
