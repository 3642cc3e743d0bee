//! Room coordination properties exercised through the public session API
//!
//! Run with: cargo test -p jamroom-sync --test room_properties

use jamroom_core::config::RoomsConfig;
use jamroom_core::models::{AccountTier, Identity, RoomId, TrackRef, UserId};
use jamroom_core::service::TierQuotaResolver;
use jamroom_sync::sync::{Clock, ConnectionLimits};
use jamroom_sync::{ClientEvent, Coordinator, Error, ServerEvent, SessionController, SessionState};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Default)]
struct ManualClock(AtomicI64);

impl ManualClock {
    fn set(&self, millis: i64) {
        self.0.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

struct Harness {
    coordinator: Arc<Coordinator>,
    clock: Arc<ManualClock>,
}

impl Harness {
    fn new() -> Self {
        Self::with_rooms(RoomsConfig::default())
    }

    fn with_rooms(rooms: RoomsConfig) -> Self {
        let clock = Arc::new(ManualClock::default());
        let coordinator = Arc::new(Coordinator::with_clock(
            ConnectionLimits::default(),
            Arc::new(TierQuotaResolver::new(rooms)),
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        Self { coordinator, clock }
    }

    fn connect(&self, user: &str, tier: AccountTier) -> Client {
        let (session, rx) = self
            .coordinator
            .connect(Identity::new(UserId::from(user), tier))
            .expect("connection should be accepted");
        Client { session, rx }
    }

    /// Premium user creating a room, returning its id
    async fn host(&self, user: &str) -> (Client, RoomId) {
        let mut client = self.connect(user, AccountTier::Premium);
        client.send(ClientEvent::CreateRoom).await;
        let room_id = match client.events().as_slice() {
            [ServerEvent::CreateRoomSuccess { room }] => room.room_id.clone(),
            other => panic!("room creation failed: {other:?}"),
        };
        (client, room_id)
    }
}

struct Client {
    session: SessionController,
    rx: UnboundedReceiver<ServerEvent>,
}

impl Client {
    async fn send(&self, event: ClientEvent) {
        self.session.handle_event(event).await;
    }

    async fn join(&self, room_id: &RoomId) {
        self.send(ClientEvent::JoinRoom {
            room_id: room_id.clone(),
        })
        .await;
    }

    async fn sync(&self, is_playing: bool, position_seconds: f64) {
        self.send(ClientEvent::Sync {
            is_playing,
            position_seconds,
        })
        .await;
    }

    fn events(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn count(&mut self, event_type: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_respect_capacity() {
    let harness = Harness::with_rooms(RoomsConfig {
        premium_quota: 4,
        ..Default::default()
    });
    let (_host, room_id) = harness.host("host").await;

    let mut tasks = Vec::new();
    for i in 0..20 {
        let coordinator = Arc::clone(&harness.coordinator);
        let room_id = room_id.clone();
        tasks.push(tokio::spawn(async move {
            coordinator
                .registry()
                .join_room(&UserId::from(format!("guest{i}")), &room_id)
        }));
    }

    let mut joined = 0;
    let mut full = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => joined += 1,
            Err(Error::RoomFull(_)) => full += 1,
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }

    // The host holds one of the four places
    assert_eq!(joined, 3);
    assert_eq!(full, 17);
    let snapshot = harness.coordinator.registry().snapshot(&room_id).unwrap();
    assert_eq!(snapshot.members.len(), 4);
}

#[tokio::test]
async fn test_user_is_never_in_two_rooms() {
    let harness = Harness::new();
    let mut rooms = Vec::new();
    let mut hosts = Vec::new();
    for host in ["h0", "h1", "h2"] {
        let (client, room_id) = harness.host(host).await;
        hosts.push(client);
        rooms.push(room_id);
    }

    let mut guests: Vec<Client> = ["g0", "g1", "g2", "g3"]
        .iter()
        .map(|user| harness.connect(user, AccountTier::Free))
        .collect();

    for round in 0..12 {
        for (i, guest) in guests.iter_mut().enumerate() {
            let room_id = &rooms[(round + i) % rooms.len()];
            if (round + i) % 5 == 4 {
                guest.send(ClientEvent::LeaveRoom).await;
            } else {
                guest.join(room_id).await;
            }
            guest.send(ClientEvent::CreateRoom).await;

            let mut seen: HashMap<UserId, usize> = HashMap::new();
            for room_id in &rooms {
                if let Some(snapshot) = harness.coordinator.registry().snapshot(room_id) {
                    assert!(snapshot.members.len() <= snapshot.max_members);
                    for member in snapshot.members {
                        *seen.entry(member).or_default() += 1;
                    }
                }
            }
            for (user, count) in &seen {
                assert_eq!(*count, 1, "{user} is in {count} rooms");
                assert!(harness.coordinator.registry().room_of(user).is_some());
            }
        }
    }
}

#[tokio::test]
async fn test_only_host_controls_playback() {
    let harness = Harness::new();
    let (mut host, room_id) = harness.host("host").await;
    let mut guest = harness.connect("guest", AccountTier::Family);
    guest.join(&room_id).await;
    host.events();
    guest.events();

    for (t, playing) in [(0, true), (2_000, false), (4_000, true)] {
        harness.clock.set(t);
        guest.sync(playing, 42.0).await;
    }

    assert!(host.events().is_empty());
    assert!(guest.events().is_empty());
    let playback = harness.coordinator.registry().snapshot(&room_id).unwrap().playback;
    assert!(!playback.is_playing);
    assert_eq!(playback.position_seconds, 0.0);
}

#[tokio::test]
async fn test_sync_rate_limit() {
    let harness = Harness::new();
    let (mut host, room_id) = harness.host("host").await;
    let mut guest = harness.connect("guest", AccountTier::Free);
    guest.join(&room_id).await;
    host.events();
    guest.events();

    harness.clock.set(10_000);
    host.sync(true, 1.0).await;
    assert_eq!(guest.count("playbackUpdate"), 1);

    // Same state within the interval
    for t in [10_200, 10_999, 11_000] {
        harness.clock.set(t);
        host.sync(true, 2.0).await;
        assert!(guest.events().is_empty(), "report at {t} should be dropped");
    }

    harness.clock.set(11_001);
    host.sync(true, 2.0).await;
    assert_eq!(guest.count("playbackUpdate"), 1);

    // A flip is never rate limited
    harness.clock.set(11_002);
    host.sync(false, 2.1).await;
    assert_eq!(guest.count("playbackPulse"), 1);
}

#[tokio::test]
async fn test_closing_one_of_several_connections() {
    let harness = Harness::new();
    let (_host, room_id) = harness.host("host").await;

    let mut devices: Vec<Client> = (0..3)
        .map(|_| harness.connect("guest", AccountTier::Free))
        .collect();
    devices[0].join(&room_id).await;

    let guest = UserId::from("guest");
    for device in devices.drain(..2) {
        assert!(device.session.disconnect().is_none());
        assert!(device.session.disconnect().is_none());
        drop(device);
        assert_eq!(harness.coordinator.registry().room_of(&guest), Some(room_id.clone()));
    }

    let last = devices.pop().unwrap();
    let outcome = last.session.disconnect().unwrap();
    assert_eq!(outcome.room_id, room_id);
    assert!(!outcome.was_host);
    assert!(last.session.disconnect().is_none());

    assert_eq!(harness.coordinator.registry().room_of(&guest), None);
    let snapshot = harness.coordinator.registry().snapshot(&room_id).unwrap();
    assert_eq!(snapshot.members, vec![UserId::from("host")]);
}

#[tokio::test]
async fn test_host_departure_closes_room_once_per_member() {
    let harness = Harness::new();
    let (host, room_id) = harness.host("host").await;

    let mut b_phone = harness.connect("b", AccountTier::Free);
    let mut b_laptop = harness.connect("b", AccountTier::Free);
    let mut c = harness.connect("c", AccountTier::Premium);
    b_phone.join(&room_id).await;
    c.join(&room_id).await;
    for client in [&mut b_phone, &mut b_laptop, &mut c] {
        client.events();
    }

    host.send(ClientEvent::LeaveRoom).await;

    for client in [&mut b_phone, &mut b_laptop, &mut c] {
        let events = client.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ServerEvent::RoomClosed { room_id: id, .. } if id == &room_id));
        assert_eq!(client.session.state(), SessionState::Authenticated);
    }
    assert!(harness.coordinator.registry().snapshot(&room_id).is_none());

    // Members are free to host their own room afterwards
    c.send(ClientEvent::CreateRoom).await;
    assert_eq!(c.count("createRoomSuccess"), 1);
}

#[tokio::test]
async fn test_listening_session_end_to_end() {
    let harness = Harness::new();
    let (mut a, room_id) = harness.host("a").await;
    let snapshot = harness.coordinator.registry().snapshot(&room_id).unwrap();
    assert_eq!(snapshot.max_members, 5);

    let mut b = harness.connect("b", AccountTier::Free);
    b.join(&room_id).await;
    assert!(matches!(
        b.events().as_slice(),
        [ServerEvent::JoinRoomSuccess { is_host: false, .. }]
    ));
    assert!(matches!(
        a.events().as_slice(),
        [ServerEvent::MemberJoined { user_id, .. }] if user_id.as_str() == "b"
    ));

    harness.clock.set(0);
    a.sync(true, 10.0).await;
    for client in [&mut a, &mut b] {
        let events = client.events();
        assert_eq!(
            events,
            vec![
                ServerEvent::PlaybackUpdate {
                    room_id: room_id.clone(),
                    track_ref: None,
                    is_playing: true,
                    position_seconds: 10.0,
                },
                ServerEvent::PlaybackPulse {
                    room_id: room_id.clone(),
                    is_playing: true,
                },
            ]
        );
    }

    harness.clock.set(500);
    a.sync(true, 11.0).await;
    assert!(a.events().is_empty());
    assert!(b.events().is_empty());

    harness.clock.set(600);
    a.sync(false, 11.0).await;
    assert!(b.events().contains(&ServerEvent::PlaybackUpdate {
        room_id: room_id.clone(),
        track_ref: None,
        is_playing: false,
        position_seconds: 11.0,
    }));

    drop(a);

    let events = b.events();
    assert!(matches!(events.as_slice(), [ServerEvent::RoomClosed { .. }]));
    assert!(harness.coordinator.registry().snapshot(&room_id).is_none());

    b.join(&room_id).await;
    assert_eq!(
        b.events(),
        vec![ServerEvent::JoinRoomFailed {
            reason: "room_not_found".to_string()
        }]
    );
}

#[tokio::test]
async fn test_queue_protocol() {
    let harness = Harness::new();
    let (mut host, room_id) = harness.host("host").await;
    let mut guest = harness.connect("guest", AccountTier::Free);
    guest.join(&room_id).await;
    host.events();
    guest.events();

    for event in [
        ClientEvent::QueueTrack {
            track: TrackRef::from("t1"),
        },
        ClientEvent::AcceptProposal { index: 0 },
        ClientEvent::SkipTrack,
    ] {
        guest.send(event).await;
        assert!(matches!(
            guest.events().as_slice(),
            [ServerEvent::ActionFailed { reason, .. }] if reason == "not_host"
        ));
    }

    guest
        .send(ClientEvent::ProposeTrack {
            track: TrackRef::from("t1"),
        })
        .await;
    host.send(ClientEvent::AcceptProposal { index: 0 }).await;
    host.events();
    guest.events();

    harness.clock.set(3_000);
    host.send(ClientEvent::SkipTrack).await;

    let events = guest.events();
    assert!(events.contains(&ServerEvent::QueueUpdated {
        room_id: room_id.clone(),
        waiting_list: Vec::new(),
        proposal_list: Vec::new(),
    }));
    let snapshot = harness.coordinator.registry().snapshot(&room_id).unwrap();
    assert_eq!(snapshot.playback.track_ref, Some(TrackRef::from("t1")));
    assert_eq!(snapshot.playback.position_seconds, 0.0);
    host.events();

    host.send(ClientEvent::SkipTrack).await;
    assert!(matches!(
        host.events().as_slice(),
        [ServerEvent::ActionFailed { reason, .. }] if reason == "invalid_input"
    ));
}
