//! Host and client controllers talking through real loopback sockets.

use std::time::Duration;

use tokio::runtime::Handle;

use gold_mine::config::{LanConfig, MatchConfig};
use gold_mine::game::controller::{MatchController, MatchMode};
use gold_mine::game::state::{MatchOutcome, Side};
use gold_mine::game::progression::InMemoryProfile;
use gold_mine::network::bridge::{lobby_ready, MatchBridge};
use gold_mine::network::lan::LanManager;

const DT: f32 = 1.0 / 60.0;

struct Peer {
    lan: LanManager,
    mc: MatchController,
    bridge: MatchBridge,
}

impl Peer {
    fn host() -> Self {
        let config = LanConfig::loopback();
        Self {
            bridge: MatchBridge::host(&config),
            lan: LanManager::with_handle(config, Handle::current()),
            mc: controller(),
        }
    }

    fn client() -> Self {
        let config = LanConfig::loopback();
        Self {
            bridge: MatchBridge::client(&config),
            lan: LanManager::with_handle(config, Handle::current()),
            mc: controller(),
        }
    }

    fn step(&mut self) {
        self.bridge.step(&mut self.lan, &mut self.mc, DT);
    }
}

fn controller() -> MatchController {
    MatchController::new(MatchConfig::default(), Box::new(InMemoryProfile::new()))
}

/// Step both ends until `done` holds or give up.
async fn run_until(host: &mut Peer, client: &mut Peer, done: impl Fn(&Peer, &Peer) -> bool) -> bool {
    for _ in 0..400 {
        host.step();
        client.step();
        if done(host, client) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

/// Connect, say hello and start a match on both ends.
async fn linked() -> (Peer, Peer) {
    let mut host = Peer::host();
    let mut client = Peer::client();

    let addr = host.lan.start_host().unwrap();
    client.lan.connect(addr).unwrap();
    assert!(run_until(&mut host, &mut client, |h, c| h.lan.is_connected() && c.lan.is_connected()).await);

    client.lan.send(&lobby_ready("Ana")).unwrap();
    assert!(run_until(&mut host, &mut client, |h, _| h.bridge.remote_player_name().is_some()).await);
    assert_eq!(host.lan.remote_player_name(), Some("Ana"));

    host.lan.set_in_lobby(false);
    let start = host.bridge.start_host_match(&mut host.mc).unwrap();
    host.lan.send(&start).unwrap();
    assert!(run_until(&mut host, &mut client, |_, c| c.mc.state().is_some()).await);

    (host, client)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_client_receives_its_hand() {
    let (host, client) = linked().await;

    assert_eq!(host.mc.mode(), MatchMode::LanHost);
    assert_eq!(client.mc.mode(), MatchMode::LanClient);

    let host_view = host.mc.state().unwrap().party(Side::Enemy).hand_card_ids();
    assert_eq!(client.mc.snapshot().unwrap().hand_card_ids, host_view);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_client_card_spawns_on_both_ends() {
    let (mut host, mut client) = linked().await;

    client.mc.select_card(0);
    assert!(client.mc.player_play_card(1));

    let spawned = run_until(&mut host, &mut client, |h, c| {
        let host_has = h
            .mc
            .state()
            .is_some_and(|s| s.entities.values().any(|e| e.is_unit() || e.is_pump()));
        let client_has = c
            .mc
            .state()
            .is_some_and(|s| s.entities.values().any(|e| e.side == Side::Player && !e.is_tower()));
        host_has && client_has
    })
    .await;
    assert!(spawned);

    let host_state = host.mc.state().unwrap();
    let host_entity = host_state.entities.values().find(|e| !e.is_tower()).unwrap();
    assert_eq!(host_entity.side, Side::Enemy);
    assert_eq!(host_entity.lane, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_state_sync_drives_client_energy() {
    let (mut host, mut client) = linked().await;
    host.mc.state_mut().unwrap().party_mut(Side::Enemy).set_energy(8.0);

    assert!(
        run_until(&mut host, &mut client, |_, c| {
            c.mc.snapshot().is_some_and(|s| s.player.energy >= 8.0)
        })
        .await
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_host_loss_is_client_win() {
    let (mut host, mut client) = linked().await;
    {
        let state = host.mc.state_mut().unwrap();
        let king = state.strongholds(Side::Player).king.unwrap();
        state.apply_damage(king, 1.0e6);
    }

    assert!(
        run_until(&mut host, &mut client, |_, c| {
            c.mc.state().is_some_and(|s| s.outcome.is_some())
        })
        .await
    );

    assert_eq!(host.mc.snapshot().unwrap().outcome, Some(MatchOutcome::EnemyWon));
    let client_snap = client.mc.snapshot().unwrap();
    assert_eq!(client_snap.outcome, Some(MatchOutcome::PlayerWon));
    assert!(client_snap.game_over);
    assert_eq!(client_snap.player.king_hp, 650.0);
    assert_eq!(client_snap.enemy.king_hp, 0.0);
    assert_eq!(client.mc.progression().gold(), 70);
    assert_eq!(host.mc.progression().gold(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_host_leaving_aborts_client_match() {
    let (mut host, mut client) = linked().await;
    host.lan.stop();

    assert!(run_until(&mut host, &mut client, |_, c| c.mc.state().is_none()).await);
    assert!(!client.lan.is_connected());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_host_lobby_outlives_a_client_that_leaves() {
    let mut host = Peer::host();
    let addr = host.lan.start_host().unwrap();

    let mut first = Peer::client();
    first.lan.connect(addr).unwrap();
    assert!(run_until(&mut host, &mut first, |h, c| h.lan.is_connected() && c.lan.is_connected()).await);
    first.lan.send(&lobby_ready("Ana")).unwrap();
    assert!(run_until(&mut host, &mut first, |h, _| h.bridge.remote_player_name().is_some()).await);

    first.lan.stop();
    assert!(run_until(&mut host, &mut first, |h, _| h.bridge.remote_player_name().is_none()).await);
    assert!(host.bridge.take_disconnect().is_some());
    assert_eq!(host.lan.remote_player_name(), None);
    assert!(host.lan.in_lobby());

    let mut second = Peer::client();
    second.lan.connect(addr).unwrap();
    assert!(run_until(&mut host, &mut second, |h, c| h.lan.is_connected() && c.lan.is_connected()).await);
    second.lan.send(&lobby_ready("Bo")).unwrap();
    assert!(run_until(&mut host, &mut second, |h, _| h.bridge.remote_player_name() == Some("Bo")).await);

    host.lan.set_in_lobby(false);
    let start = host.bridge.start_host_match(&mut host.mc).unwrap();
    host.lan.send(&start).unwrap();
    assert!(run_until(&mut host, &mut second, |_, c| c.mc.state().is_some()).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_refused_connect_surfaces_through_bridge() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let mut client = Peer::client();
    client.lan.connect(std::net::SocketAddr::from(([127, 0, 0, 1], port))).unwrap();

    let mut reason = None;
    for _ in 0..400 {
        client.step();
        reason = client.bridge.take_disconnect();
        if reason.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(reason.is_some());
    assert!(client.mc.state().is_none());
}
