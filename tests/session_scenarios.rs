//! End-to-end behaviour of a session driven through its public API with a
//! recording player and display.

mod common;

use common::{
    GatedResolver, Harness, MockPlayer, RecordingDisplay, StaticResolver, entry, entry_by, settle,
};
use musicq::config::DurationCap;
use musicq::{
    Activity, EndReason, Placement, PlayOutcome, RepeatMode, RequesterId, Session, SessionError,
    SessionId, SessionNotice, SessionSettings, SkipOutcome, SkipRequest, TeardownReason,
};
use std::sync::Arc;
use std::time::Duration;

fn settings() -> SessionSettings {
    SessionSettings::default()
}

fn skip_by(requester: u64, listeners: usize) -> SkipRequest {
    SkipRequest {
        requester: RequesterId(requester),
        vote_required: true,
        listeners,
    }
}

#[tokio::test]
async fn drains_the_queue_in_order_then_waits() {
    let h = Harness::new(settings());

    assert!(matches!(h.session.play(entry("A", 60)).await.unwrap(), PlayOutcome::Started(_)));
    assert!(matches!(
        h.session.play(entry("B", 60)).await.unwrap(),
        PlayOutcome::Queued { position: 1, .. }
    ));
    assert!(matches!(
        h.session.play(entry("C", 60)).await.unwrap(),
        PlayOutcome::Queued { position: 2, .. }
    ));
    assert!(!h.session.idle_armed().await);

    for expected in ["B", "C"] {
        h.session.on_track_ended(h.generation(), EndReason::Finished).await;
        assert_eq!(h.playing().await.as_deref(), Some(expected));
    }
    h.session.on_track_ended(h.generation(), EndReason::Finished).await;

    assert_eq!(h.player.played(), ["A", "B", "C"]);
    assert_eq!(h.playing().await, None);
    assert_eq!(h.session.activity().await.unwrap(), Activity::Waiting);
    assert!(h.session.idle_armed().await);
}

#[tokio::test]
async fn queue_repeat_cycles_back_to_the_start() {
    let h = Harness::new(settings());
    h.session.set_repeat_mode(RepeatMode::Queue).await.unwrap();
    h.session.play(entry("A", 60)).await.unwrap();
    h.session.play(entry("B", 60)).await.unwrap();

    h.session.on_track_ended(h.generation(), EndReason::Finished).await;
    h.session.on_track_ended(h.generation(), EndReason::Finished).await;

    assert_eq!(h.player.played(), ["A", "B", "A"]);
    assert_eq!(h.waiting().await, ["B"]);
}

#[tokio::test]
async fn track_repeat_replays_until_skipped() {
    let h = Harness::new(settings());
    let previous = h.session.set_repeat_mode(RepeatMode::Track).await.unwrap();
    assert_eq!(previous, RepeatMode::Off);
    h.session.play(entry("A", 60)).await.unwrap();
    h.session.play(entry("B", 60)).await.unwrap();

    h.session.on_track_ended(h.generation(), EndReason::Finished).await;
    h.session.on_track_ended(h.generation(), EndReason::Finished).await;

    // requester 1 queued A, so no vote is needed
    let outcome = h.session.skip(skip_by(1, 5)).await.unwrap();
    assert!(matches!(outcome, SkipOutcome::Skipped { skipped: Some(_), next: Some(_) }));

    assert_eq!(h.player.played(), ["A", "A", "A", "B"]);
    assert!(h.waiting().await.is_empty());
}

#[tokio::test]
async fn track_over_the_cap_is_rejected_and_nothing_changes() {
    let h = Harness::with(settings(), 3600, MockPlayer::default());
    h.session.play(entry("A", 60)).await.unwrap();

    let err = h.session.play(entry("long", 7200)).await.unwrap_err();
    assert_eq!(
        err,
        SessionError::TrackTooLong {
            duration: Duration::from_secs(7200),
            max: Duration::from_secs(3600),
        }
    );
    assert_eq!(
        err.to_string(),
        "This track (2:00:00) is longer than the allowed maximum of 1:00:00"
    );
    assert!(h.waiting().await.is_empty());
    assert_eq!(h.player.played(), ["A"]);
}

#[tokio::test]
async fn cap_changes_apply_to_the_next_play() {
    let cap = Arc::new(DurationCap::new(0));
    let session = Session::spawn(
        SessionId(5),
        settings(),
        cap.clone(),
        Arc::new(MockPlayer::default()),
        Arc::new(RecordingDisplay::default()),
    );
    session.play(entry("long", 7200)).await.unwrap();

    cap.set(3600);
    assert!(matches!(
        session.play(entry("longer", 7200)).await,
        Err(SessionError::TrackTooLong { .. })
    ));
    assert!(session.snapshot().await.unwrap().entries.is_empty());
}

#[tokio::test]
async fn batch_drops_long_entries_but_keeps_the_rest() {
    let h = Harness::with(settings(), 600, MockPlayer::default());
    let outcome = h
        .session
        .play_all(
            vec![entry("A", 60), entry("long", 601), entry("B", 60), entry("C", 600)],
            Placement::Last,
        )
        .await
        .unwrap();

    assert_eq!(outcome.started.map(|e| e.title().to_string()).as_deref(), Some("A"));
    assert_eq!(outcome.queued, 2);
    assert_eq!(outcome.first_position, Some(1));
    assert_eq!(outcome.too_long, 1);
    assert_eq!(h.waiting().await, ["B", "C"]);
}

#[tokio::test]
async fn play_next_jumps_the_queue() {
    let h = Harness::new(settings());
    h.session.play(entry("A", 60)).await.unwrap();
    h.session.play(entry("B", 60)).await.unwrap();
    h.session.play(entry("C", 60)).await.unwrap();

    let outcome = h.session.play_next(entry("urgent", 60)).await.unwrap();
    assert!(matches!(outcome, PlayOutcome::Queued { position: 1, .. }));

    h.session
        .play_all(vec![entry("x", 60), entry("y", 60)], Placement::Next)
        .await
        .unwrap();
    assert_eq!(h.waiting().await, ["x", "y", "urgent", "B", "C"]);
}

#[tokio::test]
async fn remove_out_of_range_leaves_the_queue_alone() {
    let h = Harness::new(settings());
    for title in ["A", "B", "C", "D"] {
        h.session.play(entry(title, 60)).await.unwrap();
    }

    let err = h.session.remove_at(5).await.unwrap_err();
    assert_eq!(err, SessionError::OutOfRange { index: 5, len: 3 });
    assert_eq!(h.waiting().await, ["B", "C", "D"]);

    let removed = h.session.remove_at(2).await.unwrap();
    assert_eq!(removed.title(), "C");
    assert_eq!(h.waiting().await, ["B", "D"]);
}

#[tokio::test]
async fn move_and_remove_by_requester() {
    let h = Harness::new(settings());
    h.session.play(entry_by("A", 60, 1)).await.unwrap();
    h.session.play(entry_by("B", 60, 2)).await.unwrap();
    h.session.play(entry_by("C", 60, 1)).await.unwrap();
    h.session.play(entry_by("D", 60, 2)).await.unwrap();

    let moved = h.session.move_to(3, 1).await.unwrap();
    assert_eq!(moved.title(), "D");
    assert_eq!(h.waiting().await, ["D", "B", "C"]);

    assert_eq!(h.session.remove_all_by(RequesterId(2)).await.unwrap(), 2);
    assert_eq!(h.waiting().await, ["C"]);
    assert_eq!(h.playing().await.as_deref(), Some("A"));
}

#[tokio::test]
async fn stale_player_events_are_ignored() {
    let h = Harness::new(settings());
    h.session.play(entry("A", 60)).await.unwrap();
    h.session.play(entry("B", 60)).await.unwrap();
    h.session.play(entry("C", 60)).await.unwrap();
    let first = h.generation();

    h.session.skip(skip_by(1, 1)).await.unwrap();
    assert_eq!(h.playing().await.as_deref(), Some("B"));

    h.session.on_track_ended(first, EndReason::Finished).await;
    h.session.on_track_failed(first, "late error".into()).await;
    h.session.on_track_started(first).await;

    assert_eq!(h.playing().await.as_deref(), Some("B"));
    assert_eq!(h.waiting().await, ["C"]);
    assert_eq!(h.player.played(), ["A", "B"]);
}

#[tokio::test]
async fn concurrent_plays_start_exactly_one_track() {
    let h = Harness::new(settings());
    let (a, b) = tokio::join!(h.session.play(entry("A", 60)), h.session.play(entry("B", 60)));
    let outcomes = [a.unwrap(), b.unwrap()];

    let started = outcomes
        .iter()
        .filter(|o| matches!(o, PlayOutcome::Started(_)))
        .count();
    let queued_first = outcomes
        .iter()
        .filter(|o| matches!(o, PlayOutcome::Queued { position: 1, .. }))
        .count();
    assert_eq!((started, queued_first), (1, 1));
    assert_eq!(h.player.played().len(), 1);
}

#[tokio::test]
async fn player_events_flow_through_the_reporter() {
    let h = Harness::new(settings());
    h.session.play(entry("A", 60)).await.unwrap();
    h.session.play(entry("B", 60)).await.unwrap();

    h.player.last_reporter().started();
    settle().await;
    assert_eq!(h.display.shown(), 1);

    h.player.last_reporter().ended(EndReason::Finished);
    settle().await;
    assert_eq!(h.playing().await.as_deref(), Some("B"));

    h.player.last_reporter().failed("decoder error");
    settle().await;
    assert_eq!(h.playing().await, None);
    assert!(h.session.idle_armed().await);
}

#[tokio::test]
async fn card_appears_only_once_playback_starts() {
    let h = Harness::new(settings());
    h.session.play(entry("A", 60)).await.unwrap();
    h.session.play(entry("B", 60)).await.unwrap();
    settle().await;
    assert_eq!(h.display.shown(), 0);

    h.session.on_track_started(h.generation()).await;
    settle().await;
    assert_eq!(h.display.shown(), 1);
    assert_eq!(h.display.last().unwrap().waiting, 1);

    h.session.set_volume(80).await.unwrap();
    settle().await;
    assert_eq!(h.display.shown(), 1);
    assert_eq!(h.display.replaced(), 1);
    assert_eq!(h.display.last().unwrap().volume, 80);

    // advancing keeps the card until the queue runs dry
    h.session.on_track_ended(h.generation(), EndReason::Finished).await;
    settle().await;
    assert_eq!(h.display.cleared(), 0);

    h.session.on_track_ended(h.generation(), EndReason::Finished).await;
    settle().await;
    assert_eq!(h.display.cleared(), 1);
}

#[tokio::test]
async fn failure_threshold_halts_auto_advance() {
    let player = MockPlayer::failing(&["f1", "f2", "f3", "f4"]);
    let h = Harness::with(settings(), 0, player);
    let mut notices = h.session.subscribe();

    let batch = ["f1", "f2", "f3", "f4", "ok"].map(|t| entry(t, 60)).to_vec();
    h.session.play_all(batch, Placement::Last).await.unwrap();

    assert_eq!(h.player.played(), ["f1", "f2", "f3"]);
    assert_eq!(h.session.activity().await.unwrap(), Activity::Waiting);
    assert_eq!(h.waiting().await, ["f4", "ok"]);

    let seen: Vec<_> = std::iter::from_fn(|| notices.try_recv().ok()).collect();
    assert!(matches!(&seen[..], [
        SessionNotice::TrackFailed { .. },
        SessionNotice::TrackFailed { .. },
        SessionNotice::AutoAdvanceHalted { failures: 3 },
    ]));

    // a manual skip resumes with a fresh count
    h.session.skip(skip_by(1, 1)).await.unwrap();
    assert_eq!(h.player.played(), ["f1", "f2", "f3", "f4", "ok"]);
    assert_eq!(h.playing().await.as_deref(), Some("ok"));
}

#[tokio::test]
async fn started_track_resets_the_failure_count() {
    let h = Harness::new(SessionSettings {
        failure_threshold: 2,
        ..settings()
    });
    for title in ["A", "B", "C", "D"] {
        h.session.play(entry(title, 60)).await.unwrap();
    }

    h.session.on_track_failed(h.generation(), "403".into()).await;
    h.session.on_track_started(h.generation()).await;
    h.session.on_track_failed(h.generation(), "403".into()).await;

    // one failure since B started, below the threshold of two
    assert_eq!(h.playing().await.as_deref(), Some("C"));
}

#[tokio::test]
async fn skip_needs_a_quorum_unless_it_is_your_track() {
    let h = Harness::new(settings());
    h.session.play(entry_by("A", 60, 1)).await.unwrap();
    h.session.play(entry_by("B", 60, 1)).await.unwrap();

    // ceil(4 * 0.55) = 3
    assert_eq!(
        h.session.skip(skip_by(2, 4)).await.unwrap(),
        SkipOutcome::VoteRecorded { votes: 1, required: 3 }
    );
    assert_eq!(
        h.session.skip(skip_by(2, 4)).await.unwrap(),
        SkipOutcome::VoteRecorded { votes: 1, required: 3 }
    );
    assert_eq!(
        h.session.skip(skip_by(3, 4)).await.unwrap(),
        SkipOutcome::VoteRecorded { votes: 2, required: 3 }
    );
    assert!(matches!(
        h.session.skip(skip_by(4, 4)).await.unwrap(),
        SkipOutcome::Skipped { .. }
    ));
    assert_eq!(h.playing().await.as_deref(), Some("B"));

    // requester of B skips outright
    assert!(matches!(
        h.session.skip(skip_by(1, 4)).await.unwrap(),
        SkipOutcome::Skipped { next: None, .. }
    ));
    assert_eq!(h.session.skip(skip_by(1, 4)).await, Err(SessionError::NothingPlaying));
}

#[tokio::test]
async fn votes_do_not_carry_over_to_the_next_track() {
    let h = Harness::new(settings());
    h.session.play(entry_by("A", 60, 1)).await.unwrap();
    h.session.play(entry_by("B", 60, 1)).await.unwrap();

    h.session.skip(skip_by(2, 4)).await.unwrap();
    h.session.skip(skip_by(3, 4)).await.unwrap();
    h.session.on_track_ended(h.generation(), EndReason::Finished).await;

    assert_eq!(
        h.session.skip(skip_by(4, 4)).await.unwrap(),
        SkipOutcome::VoteRecorded { votes: 1, required: 3 }
    );
}

#[tokio::test]
async fn forced_skip_ignores_votes() {
    let h = Harness::new(settings());
    h.session.play(entry_by("A", 60, 1)).await.unwrap();
    let request = SkipRequest {
        requester: RequesterId(9),
        vote_required: false,
        listeners: 10,
    };
    assert!(matches!(
        h.session.skip(request).await.unwrap(),
        SkipOutcome::Skipped { .. }
    ));
    assert!(h.player.stops() >= 1);
}

#[tokio::test]
async fn skipping_the_last_entry_waits_and_arms_the_idle_timer() {
    let h = Harness::new(settings());
    h.session.play(entry("A", 60)).await.unwrap();
    assert!(!h.session.idle_armed().await);

    let outcome = h.session.skip(skip_by(1, 3)).await.unwrap();
    assert!(matches!(outcome, SkipOutcome::Skipped { skipped: Some(_), next: None }));

    assert_eq!(h.playing().await, None);
    assert_eq!(h.session.activity().await.unwrap(), Activity::Waiting);
    assert!(h.session.idle_armed().await);
    assert!(h.player.stops() >= 1);
}

#[tokio::test]
async fn stopped_end_does_not_advance() {
    let h = Harness::new(settings());
    h.session.play(entry("A", 60)).await.unwrap();
    h.session.play(entry("B", 60)).await.unwrap();

    h.session.on_track_ended(h.generation(), EndReason::Stopped).await;

    assert_eq!(h.playing().await, None);
    assert_eq!(h.waiting().await, ["B"]);
    assert_eq!(h.player.played(), ["A"]);
    assert_eq!(h.session.activity().await.unwrap(), Activity::Waiting);
    // the queue still has something worth keeping
    assert!(!h.session.idle_armed().await);
}

#[tokio::test]
async fn playing_entry_is_never_queued_again() {
    let h = Harness::new(settings());
    let a = entry("A", 60);
    h.session.play(a.clone()).await.unwrap();

    assert_eq!(
        h.session.play(a.clone()).await.unwrap(),
        PlayOutcome::AlreadyPlaying(a.clone())
    );
    assert!(h.waiting().await.is_empty());

    h.session.set_repeat_mode(RepeatMode::Queue).await.unwrap();
    h.session.play(entry("B", 60)).await.unwrap();
    let outcome = h
        .session
        .play_all(vec![a.clone(), entry("C", 60)], Placement::Last)
        .await
        .unwrap();
    assert_eq!(outcome.queued, 1);
    assert_eq!(h.waiting().await, ["B", "C"]);

    h.session.on_track_ended(h.generation(), EndReason::Finished).await;
    assert_eq!(h.playing().await.as_deref(), Some("B"));
    assert_eq!(h.waiting().await, ["C", "A"]);
}

#[tokio::test]
async fn batch_counts_only_what_it_added() {
    let h = Harness::new(settings());
    let b = entry("B", 60);
    h.session.play(entry("A", 60)).await.unwrap();
    h.session.play(b.clone()).await.unwrap();

    let outcome = h
        .session
        .play_all(vec![b, entry("C", 60)], Placement::Last)
        .await
        .unwrap();

    assert_eq!(outcome.started, None);
    assert_eq!(outcome.queued, 1);
    assert_eq!(outcome.first_position, Some(2));
    assert_eq!(h.waiting().await, ["B", "C"]);
}

#[tokio::test]
async fn stop_clears_but_stays_connected() {
    let h = Harness::new(settings());
    h.session.play(entry("A", 60)).await.unwrap();
    h.session.play(entry("B", 60)).await.unwrap();

    h.session.stop().await.unwrap();

    assert_eq!(h.playing().await, None);
    assert!(h.waiting().await.is_empty());
    assert!(h.player.stops() >= 1);
    assert!(!h.session.is_closed());
    assert!(h.session.idle_armed().await);

    h.session.play(entry("C", 60)).await.unwrap();
    assert_eq!(h.playing().await.as_deref(), Some("C"));
}

#[tokio::test]
async fn request_resolved_after_stop_is_discarded() {
    let h = Harness::new(settings());
    let resolver = Arc::new(GatedResolver::new(vec![entry("late", 60)]));

    let task = {
        let session = h.session.clone();
        let resolver = resolver.clone();
        tokio::spawn(async move {
            session
                .request(resolver.as_ref(), "late", RequesterId(1), Placement::Last)
                .await
        })
    };
    settle().await;

    h.session.stop().await.unwrap();
    resolver.release();

    assert_eq!(task.await.unwrap(), Err(SessionError::Cancelled));
    assert!(h.player.played().is_empty());
    assert!(h.waiting().await.is_empty());
}

#[tokio::test]
async fn request_queues_what_the_resolver_found() {
    let h = Harness::new(settings());
    let resolver = StaticResolver(vec![entry("one", 60), entry("two", 60)]);

    let outcome = h
        .session
        .request(&resolver, "mix", RequesterId(1), Placement::Last)
        .await
        .unwrap();
    assert_eq!(outcome.queued, 1);
    assert_eq!(h.player.played(), ["one"]);

    let empty = StaticResolver(Vec::new());
    let err = h
        .session
        .request(&empty, "nothing", RequesterId(1), Placement::Last)
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::Resolve(musicq::ResolveError::NotFound));
}

#[tokio::test]
async fn pause_and_resume() {
    let h = Harness::new(settings());
    assert_eq!(h.session.set_paused(true).await, Err(SessionError::NothingPlaying));

    h.session.play(entry("A", 60)).await.unwrap();
    assert_eq!(h.session.set_paused(true).await.unwrap(), Activity::Paused);
    assert_eq!(h.player.paused(), Some(true));
    assert!(h.session.now_playing().await.unwrap().unwrap().paused);

    assert_eq!(h.session.set_paused(false).await.unwrap(), Activity::Playing);
    assert_eq!(h.player.paused(), Some(false));
}

#[tokio::test]
async fn volume_is_bounded() {
    let h = Harness::new(settings());
    assert_eq!(h.session.set_volume(151).await, Err(SessionError::VolumeOutOfRange(151)));

    h.session.play(entry("A", 60)).await.unwrap();
    assert_eq!(h.player.volume(), Some(35));
    assert_eq!(h.session.set_volume(150).await.unwrap(), 150);
    assert_eq!(h.player.volume(), Some(150));
}

#[tokio::test]
async fn shuffle_keeps_every_entry() {
    let h = Harness::new(settings());
    for i in 0..12 {
        h.session.play(entry(&format!("t{i}"), 30)).await.unwrap();
    }
    let mut before = h.waiting().await;
    assert_eq!(h.session.shuffle().await.unwrap(), 11);
    let mut after = h.waiting().await;

    before.sort();
    after.sort();
    assert_eq!(before, after);

    let snapshot = h.session.snapshot().await.unwrap();
    assert_eq!(snapshot.total, Duration::from_secs(11 * 30));
    assert_eq!(snapshot.activity, Activity::Playing);
}

#[tokio::test]
async fn leave_tears_down_once() {
    let h = Harness::new(settings());
    let mut notices = h.session.subscribe();
    h.session.play(entry("A", 60)).await.unwrap();

    h.session.leave().await.unwrap();
    assert!(h.session.is_closed());
    assert_eq!(h.player.leaves(), 1);
    assert_eq!(h.session.leave().await, Err(SessionError::NotConnected));
    assert_eq!(h.session.play(entry("B", 60)).await, Err(SessionError::NotConnected));
    assert_eq!(h.player.leaves(), 1);

    assert_eq!(
        notices.try_recv().ok(),
        Some(SessionNotice::TornDown(TeardownReason::Requested))
    );
}

#[tokio::test(start_paused = true)]
async fn idle_session_leaves_after_the_timeout() {
    let h = Harness::new(SessionSettings {
        idle_timeout: Duration::from_secs(60),
        ..settings()
    });
    let mut notices = h.session.subscribe();

    tokio::time::sleep(Duration::from_secs(59)).await;
    settle().await;
    assert!(!h.session.is_closed());

    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;
    assert!(h.session.is_closed());
    assert_eq!(h.player.leaves(), 1);
    assert_eq!(
        notices.try_recv().ok(),
        Some(SessionNotice::TornDown(TeardownReason::IdleTimeout))
    );
}

#[tokio::test(start_paused = true)]
async fn playback_holds_off_the_idle_timer() {
    let h = Harness::new(SessionSettings {
        idle_timeout: Duration::from_secs(60),
        ..settings()
    });
    h.session.play(entry("A", 600)).await.unwrap();

    tokio::time::sleep(Duration::from_secs(300)).await;
    settle().await;
    assert!(!h.session.is_closed());

    h.session.on_track_ended(h.generation(), EndReason::Finished).await;
    assert!(h.session.idle_armed().await);

    // playing again before expiry cancels the countdown
    tokio::time::sleep(Duration::from_secs(30)).await;
    h.session.play(entry("B", 600)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;
    settle().await;
    assert!(!h.session.is_closed());

    h.session.stop().await.unwrap();
    tokio::time::sleep(Duration::from_secs(61)).await;
    settle().await;
    assert!(h.session.is_closed());
}

#[tokio::test(start_paused = true)]
async fn zero_timeout_never_leaves() {
    let h = Harness::new(SessionSettings {
        idle_timeout: Duration::ZERO,
        ..settings()
    });
    tokio::time::sleep(Duration::from_secs(86_400)).await;
    settle().await;
    assert!(!h.session.is_closed());
    assert!(!h.session.idle_armed().await);
}
