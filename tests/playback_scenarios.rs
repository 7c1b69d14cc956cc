mod support;

use std::time::Duration;

use pretty_assertions::assert_eq;

use bonebot::audio::bulk::{playlist_pages, BulkEnqueuer, BulkReport};
use bonebot::audio::coordinator::Appended;
use bonebot::audio::notice::Notice;
use bonebot::audio::state::PlaybackPhase;
use bonebot::error::MusicError;
use bonebot::sources::PlaylistEntry;

use support::*;

fn titles(tracks: &[bonebot::audio::state::Track]) -> Vec<String> {
    tracks.iter().map(|t| t.title.clone()).collect()
}

#[tokio::test]
async fn plays_queue_in_order_then_goes_idle() {
    let transport = FakeTransport::new();
    let resolver = FakeResolver::new();
    let announcer = RecordingAnnouncer::new();
    let coordinator = coordinator(transport.clone(), resolver.clone());

    let appended = coordinator
        .enqueue(GUILD, tracks(&["a", "b"]), Some(announcer.clone()))
        .await
        .unwrap();
    assert_eq!(
        appended,
        Appended {
            added: 2,
            queue_len: 2,
            truncated: false
        }
    );

    coordinator.connect(GUILD, CHANNEL).await.unwrap();
    coordinator.advance(GUILD);

    eventually("first track playing", || async {
        coordinator.snapshot(GUILD).await.phase == PlaybackPhase::Playing
    })
    .await;
    let snapshot = coordinator.snapshot(GUILD).await;
    assert_eq!(snapshot.now_playing.map(|t| t.title), Some("a".to_string()));
    assert_eq!(titles(&snapshot.tracks), vec!["b"]);
    assert_eq!(transport.plays(GUILD), vec![stream_for("a")]);

    assert!(transport.finish_current(GUILD));
    eventually("second track playing", || async {
        transport.plays(GUILD).len() == 2
    })
    .await;

    assert!(transport.finish_current(GUILD));
    eventually("idle after the last track", || async {
        coordinator.snapshot(GUILD).await.phase == PlaybackPhase::Idle
    })
    .await;

    let snapshot = coordinator.snapshot(GUILD).await;
    assert!(snapshot.tracks.is_empty());
    assert!(snapshot.connected, "going idle never disconnects");
    assert_eq!(transport.plays(GUILD), vec![stream_for("a"), stream_for("b")]);
    assert_eq!(
        announcer.notices(),
        vec![
            Notice::NowPlaying { title: "a".into() },
            Notice::NowPlaying { title: "b".into() },
        ]
    );
}

#[tokio::test]
async fn enqueue_without_connection_only_queues() {
    let transport = FakeTransport::new();
    let resolver = FakeResolver::new();
    let coordinator = coordinator(transport.clone(), resolver.clone());

    coordinator.enqueue(GUILD, tracks(&["a"]), None).await.unwrap();
    coordinator.advance(GUILD);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = coordinator.snapshot(GUILD).await;
    assert_eq!(snapshot.phase, PlaybackPhase::Idle);
    assert_eq!(titles(&snapshot.tracks), vec!["a"]);
    assert_eq!(resolver.resolve_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_resolution_is_retried_then_skipped() {
    let transport = FakeTransport::new();
    let resolver = FakeResolver::new();
    let announcer = RecordingAnnouncer::new();
    resolver.fail("broken");
    let coordinator = coordinator(transport.clone(), resolver.clone());

    coordinator
        .enqueue(GUILD, tracks(&["broken", "fine"]), Some(announcer.clone()))
        .await
        .unwrap();
    coordinator.connect(GUILD, CHANNEL).await.unwrap();
    coordinator.advance(GUILD);

    eventually("the next track to play", || async {
        !transport.plays(GUILD).is_empty()
    })
    .await;

    assert_eq!(transport.plays(GUILD), vec![stream_for("fine")]);
    // Three attempts for the broken track, one for the good one.
    assert_eq!(resolver.resolve_calls(), 4);
    eventually("both notices", || async { announcer.notices().len() == 2 }).await;
    assert_eq!(
        announcer.notices(),
        vec![
            Notice::Skipping {
                title: "broken".into()
            },
            Notice::NowPlaying {
                title: "fine".into()
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn failing_last_track_leaves_guild_idle_and_connected() {
    let transport = FakeTransport::new();
    let resolver = FakeResolver::new();
    resolver.fail("broken");
    let coordinator = coordinator(transport.clone(), resolver.clone());

    coordinator.enqueue(GUILD, tracks(&["broken"]), None).await.unwrap();
    coordinator.connect(GUILD, CHANNEL).await.unwrap();
    coordinator.advance(GUILD);

    eventually("retries to run out", || async { resolver.resolve_calls() == 3 }).await;
    eventually("idle", || async {
        coordinator.snapshot(GUILD).await.phase == PlaybackPhase::Idle
    })
    .await;

    let snapshot = coordinator.snapshot(GUILD).await;
    assert!(snapshot.tracks.is_empty());
    assert!(snapshot.now_playing.is_none());
    assert!(snapshot.connected);
    assert!(transport.plays(GUILD).is_empty());
}

#[tokio::test]
async fn transport_refusing_a_stream_skips_to_the_next_track() {
    let transport = FakeTransport::new();
    let resolver = FakeResolver::new();
    transport.refuse_to_play(&stream_for("corrupt"));
    let coordinator = coordinator(transport.clone(), resolver.clone());

    coordinator
        .enqueue(GUILD, tracks(&["corrupt", "ok"]), None)
        .await
        .unwrap();
    coordinator.connect(GUILD, CHANNEL).await.unwrap();
    coordinator.advance(GUILD);

    eventually("the good track", || async {
        transport.plays(GUILD) == vec![stream_for("ok")]
    })
    .await;
}

#[tokio::test]
async fn playback_error_still_advances() {
    let transport = FakeTransport::new();
    let resolver = FakeResolver::new();
    let coordinator = coordinator(transport.clone(), resolver.clone());

    coordinator.enqueue(GUILD, tracks(&["a", "b"]), None).await.unwrap();
    coordinator.connect(GUILD, CHANNEL).await.unwrap();
    coordinator.advance(GUILD);
    eventually("a playing", || async { transport.plays(GUILD).len() == 1 }).await;

    assert!(transport.fail_current(GUILD, "decoder hiccup"));
    eventually("b playing", || async { transport.plays(GUILD).len() == 2 }).await;
}

#[tokio::test]
async fn skip_racing_an_enqueue_advances_exactly_once() {
    let transport = FakeTransport::new();
    let resolver = FakeResolver::new();
    let coordinator = coordinator(transport.clone(), resolver.clone());

    coordinator
        .enqueue(GUILD, tracks(&["a", "b", "c"]), None)
        .await
        .unwrap();
    coordinator.connect(GUILD, CHANNEL).await.unwrap();
    coordinator.advance(GUILD);
    eventually("a playing", || async {
        coordinator.snapshot(GUILD).await.phase == PlaybackPhase::Playing
    })
    .await;

    let (skipped, appended) = tokio::join!(
        coordinator.skip(GUILD),
        coordinator.enqueue(GUILD, tracks(&["d"]), None),
    );
    assert!(skipped);
    assert!(appended.is_ok());
    coordinator.advance(GUILD);
    coordinator.advance(GUILD);

    eventually("b playing", || async {
        coordinator.snapshot(GUILD).await.phase == PlaybackPhase::Playing
    })
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(transport.plays(GUILD), vec![stream_for("a"), stream_for("b")]);
    let snapshot = coordinator.snapshot(GUILD).await;
    assert_eq!(snapshot.now_playing.map(|t| t.title), Some("b".to_string()));
    assert_eq!(titles(&snapshot.tracks), vec!["c", "d"]);
}

#[tokio::test]
async fn skip_advances_even_when_stop_fails() {
    let transport = FakeTransport::new();
    let resolver = FakeResolver::new();
    let coordinator = coordinator(transport.clone(), resolver.clone());

    coordinator.enqueue(GUILD, tracks(&["a", "b"]), None).await.unwrap();
    coordinator.connect(GUILD, CHANNEL).await.unwrap();
    coordinator.advance(GUILD);
    eventually("a playing", || async { transport.plays(GUILD).len() == 1 }).await;

    transport.fail_stops();
    assert!(coordinator.skip(GUILD).await);
    eventually("b playing", || async { transport.plays(GUILD).len() == 2 }).await;
}

#[tokio::test]
async fn skip_pause_and_resume_need_something_playing() {
    let transport = FakeTransport::new();
    let resolver = FakeResolver::new();
    let coordinator = coordinator(transport.clone(), resolver.clone());

    assert!(!coordinator.skip(GUILD).await);
    assert!(!coordinator.pause(GUILD).await);

    coordinator.enqueue(GUILD, tracks(&["a"]), None).await.unwrap();
    assert!(!coordinator.skip(GUILD).await);
    assert!(!coordinator.resume(GUILD).await);

    coordinator.connect(GUILD, CHANNEL).await.unwrap();
    coordinator.advance(GUILD);
    eventually("a playing", || async { transport.plays(GUILD).len() == 1 }).await;

    assert!(coordinator.pause(GUILD).await);
    assert!(transport.is_paused(GUILD));
    assert!(coordinator.resume(GUILD).await);
    assert!(!transport.is_paused(GUILD));
}

#[tokio::test(start_paused = true)]
async fn stop_during_resolution_discards_the_result() {
    let transport = FakeTransport::new();
    let resolver = FakeResolver::new();
    resolver.set_delay(Duration::from_secs(5));
    let coordinator = coordinator(transport.clone(), resolver.clone());

    coordinator.enqueue(GUILD, tracks(&["a", "b"]), None).await.unwrap();
    coordinator.connect(GUILD, CHANNEL).await.unwrap();
    coordinator.advance(GUILD);
    eventually("resolving", || async {
        coordinator.snapshot(GUILD).await.phase == PlaybackPhase::Resolving
    })
    .await;

    assert!(coordinator.stop(GUILD).await);
    eventually("guild discarded", || async { !coordinator.is_active(GUILD) }).await;

    tokio::time::sleep(Duration::from_secs(10)).await;

    assert!(transport.plays(GUILD).is_empty());
    assert_eq!(transport.disconnects(), vec![(GUILD, false)]);
    assert!(!coordinator.is_active(GUILD));
    assert!(coordinator.snapshot(GUILD).await.tracks.is_empty());
}

#[tokio::test]
async fn stop_with_nothing_to_stop() {
    let transport = FakeTransport::new();
    let resolver = FakeResolver::new();
    let coordinator = coordinator(transport.clone(), resolver.clone());

    assert!(!coordinator.stop(GUILD).await);
    assert!(transport.disconnects().is_empty());
}

#[tokio::test]
async fn voice_lost_tears_down_without_leaving_again() {
    let transport = FakeTransport::new();
    let resolver = FakeResolver::new();
    let coordinator = coordinator(transport.clone(), resolver.clone());

    coordinator.enqueue(GUILD, tracks(&["a", "b"]), None).await.unwrap();
    coordinator.connect(GUILD, CHANNEL).await.unwrap();
    coordinator.advance(GUILD);
    eventually("a playing", || async { transport.plays(GUILD).len() == 1 }).await;

    transport.drop_connection(GUILD);
    coordinator.voice_lost(GUILD, Some(CHANNEL));
    eventually("guild discarded", || async { !coordinator.is_active(GUILD) }).await;

    assert_eq!(transport.disconnects(), vec![(GUILD, true)]);
    assert_eq!(transport.plays(GUILD).len(), 1);
}

#[tokio::test]
async fn disconnect_from_an_old_session_keeps_the_queue() {
    let transport = FakeTransport::new();
    let resolver = FakeResolver::new();
    let coordinator = coordinator(transport.clone(), resolver.clone());

    // Queued by a fresh /play that has not joined voice yet.
    coordinator.enqueue(GUILD, tracks(&["a"]), None).await.unwrap();
    coordinator.voice_lost(GUILD, Some(CHANNEL));

    let snapshot = coordinator.snapshot(GUILD).await;
    assert_eq!(titles(&snapshot.tracks), vec!["a"]);
    assert!(coordinator.is_active(GUILD));

    coordinator.connect(GUILD, CHANNEL).await.unwrap();
    coordinator.advance(GUILD);
    eventually("a playing", || async { transport.plays(GUILD).len() == 1 }).await;
}

#[tokio::test]
async fn disconnect_from_another_channel_is_ignored() {
    let transport = FakeTransport::new();
    let resolver = FakeResolver::new();
    let coordinator = coordinator(transport.clone(), resolver.clone());

    coordinator.connect(GUILD, CHANNEL).await.unwrap();
    transport.drop_connection(GUILD);
    coordinator.voice_lost(GUILD, Some(OTHER_CHANNEL));

    assert!(coordinator.snapshot(GUILD).await.connected);
    assert!(transport.disconnects().is_empty());
}

#[tokio::test]
async fn channel_emptied_leaves_voice() {
    let transport = FakeTransport::new();
    let resolver = FakeResolver::new();
    let coordinator = coordinator(transport.clone(), resolver.clone());

    coordinator.enqueue(GUILD, tracks(&["a"]), None).await.unwrap();
    coordinator.connect(GUILD, CHANNEL).await.unwrap();

    coordinator.channel_emptied(GUILD);
    eventually("guild discarded", || async { !coordinator.is_active(GUILD) }).await;
    assert_eq!(transport.disconnects(), vec![(GUILD, false)]);
    assert_eq!(transport.channel(GUILD), None);
}

#[tokio::test]
async fn queue_edits() {
    let transport = FakeTransport::new();
    let resolver = FakeResolver::new();
    let coordinator = coordinator(transport.clone(), resolver.clone());

    coordinator
        .enqueue(GUILD, tracks(&["a", "b", "c"]), None)
        .await
        .unwrap();

    assert_eq!(coordinator.remove_at(GUILD, 2).await.map(|t| t.title), Some("b".into()));
    assert_eq!(coordinator.remove_at(GUILD, 0).await, None);
    assert_eq!(coordinator.remove_at(GUILD, 3).await, None);
    assert_eq!(titles(&coordinator.snapshot(GUILD).await.tracks), vec!["a", "c"]);

    assert!(coordinator.clear(GUILD).await);
    assert!(!coordinator.clear(GUILD).await);
    assert!(coordinator.snapshot(GUILD).await.tracks.is_empty());

    // Unknown guilds answer without creating state.
    assert_eq!(coordinator.remove_at(OTHER_GUILD, 1).await, None);
    assert!(!coordinator.is_active(OTHER_GUILD));
}

#[tokio::test]
async fn queue_capacity_is_enforced() {
    let transport = FakeTransport::new();
    let resolver = FakeResolver::new();
    let coordinator = coordinator_with_capacity(transport.clone(), resolver.clone(), 2);

    let appended = coordinator
        .enqueue(GUILD, tracks(&["a", "b", "c"]), None)
        .await
        .unwrap();
    assert_eq!(
        appended,
        Appended {
            added: 2,
            queue_len: 2,
            truncated: true
        }
    );

    let full = coordinator.enqueue(GUILD, tracks(&["d"]), None).await;
    assert!(matches!(full, Err(MusicError::QueueFull { max: 2 })));
}

#[tokio::test]
async fn guilds_are_independent() {
    let transport = FakeTransport::new();
    let resolver = FakeResolver::new();
    let coordinator = coordinator(transport.clone(), resolver.clone());

    coordinator.enqueue(GUILD, tracks(&["a"]), None).await.unwrap();
    coordinator.enqueue(OTHER_GUILD, tracks(&["x"]), None).await.unwrap();
    coordinator.connect(GUILD, CHANNEL).await.unwrap();
    coordinator.connect(OTHER_GUILD, OTHER_CHANNEL).await.unwrap();
    coordinator.advance(GUILD);
    coordinator.advance(OTHER_GUILD);

    eventually("both playing", || async {
        transport.plays(GUILD).len() == 1 && transport.plays(OTHER_GUILD).len() == 1
    })
    .await;

    assert!(coordinator.stop(GUILD).await);
    assert!(coordinator.is_active(OTHER_GUILD));
    assert_eq!(
        coordinator.snapshot(OTHER_GUILD).await.phase,
        PlaybackPhase::Playing
    );
}

#[tokio::test]
async fn playlist_expansion_interleaves_with_playback() {
    let transport = FakeTransport::new();
    let resolver = FakeResolver::new();
    let announcer = RecordingAnnouncer::new();
    let coordinator = coordinator(transport.clone(), resolver.clone());

    let playlist = "https://www.youtube.com/playlist?list=PL1";
    let mut entries: Vec<PlaylistEntry> = (1..=12).map(|i| entry(&format!("p{i}"))).collect();
    entries[4] = PlaylistEntry::default();
    resolver.add_playlist(playlist, entries);

    coordinator
        .enqueue(GUILD, tracks(&["p1"]), Some(announcer.clone()))
        .await
        .unwrap();
    coordinator.connect(GUILD, CHANNEL).await.unwrap();
    coordinator.advance(GUILD);

    let expansion = BulkEnqueuer::new(coordinator.clone())
        .spawn(
            GUILD,
            "YouTube playlist".to_string(),
            playlist_pages(resolver.clone(), playlist),
            Some(announcer.clone()),
        )
        .unwrap();
    let report = expansion.await.unwrap();

    assert_eq!(
        report,
        BulkReport {
            added: 10,
            unavailable: 1,
            failed_pages: 0,
            stopped_early: false
        }
    );

    eventually("p1 playing", || async { transport.plays(GUILD).len() == 1 }).await;
    assert_eq!(transport.plays(GUILD), vec![stream_for("p1")]);

    let snapshot = coordinator.snapshot(GUILD).await;
    assert_eq!(snapshot.tracks.len(), 10);
    assert_eq!(snapshot.tracks[0].title, "p2");
    assert_eq!(snapshot.tracks[3].title, "p6");

    eventually("bulk flag cleared", || async {
        !coordinator.snapshot(GUILD).await.bulk_enqueue_in_flight
    })
    .await;

    let queued: Vec<Notice> = announcer
        .notices()
        .into_iter()
        .filter(|n| matches!(n, Notice::QueuedMore { .. }))
        .collect();
    assert_eq!(
        queued,
        vec![
            Notice::QueuedMore {
                added: 8,
                total: 8,
                source: "YouTube playlist".into()
            },
            Notice::QueuedMore {
                added: 2,
                total: 10,
                source: "YouTube playlist".into()
            },
        ]
    );
}

#[tokio::test]
async fn expansion_stops_when_the_queue_fills_up() {
    let transport = FakeTransport::new();
    let resolver = FakeResolver::new();
    let coordinator = coordinator_with_capacity(transport.clone(), resolver.clone(), 5);

    let playlist = "https://www.youtube.com/playlist?list=PL2";
    resolver.add_playlist(playlist, (1..=20).map(|i| entry(&format!("p{i}"))).collect());

    coordinator.enqueue(GUILD, tracks(&["p1"]), None).await.unwrap();
    let report = BulkEnqueuer::new(coordinator.clone())
        .spawn(
            GUILD,
            "YouTube playlist".to_string(),
            playlist_pages(resolver.clone(), playlist),
            None,
        )
        .unwrap()
        .await
        .unwrap();

    assert_eq!(report.added, 4);
    assert!(report.stopped_early);
    assert_eq!(coordinator.snapshot(GUILD).await.tracks.len(), 5);
}

#[tokio::test]
async fn bulk_session_outlived_by_stop_cannot_append() {
    let transport = FakeTransport::new();
    let resolver = FakeResolver::new();
    let coordinator = coordinator(transport.clone(), resolver.clone());

    assert!(coordinator.bulk_session(GUILD).is_none());

    coordinator.enqueue(GUILD, tracks(&["a"]), None).await.unwrap();
    let session = coordinator.bulk_session(GUILD).unwrap();
    assert!(coordinator.snapshot(GUILD).await.bulk_enqueue_in_flight);

    assert!(coordinator.stop(GUILD).await);
    assert!(session.append(tracks(&["late"])).await.is_none());

    // A fresh state for the same guild doesn't see the stale session's tracks.
    coordinator.enqueue(GUILD, tracks(&["b"]), None).await.unwrap();
    let snapshot = coordinator.snapshot(GUILD).await;
    assert_eq!(titles(&snapshot.tracks), vec!["b"]);
    assert!(!snapshot.bulk_enqueue_in_flight);
}
