//! Gold Mine headless runner
//!
//! `gold-mine` plays a solo match against the AI. `gold-mine host` waits for
//! a LAN peer and hosts a match; `gold-mine join [addr]` finds or dials a
//! host and plays as the client. Both local sides play on autopilot.

use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use gold_mine::{
    FRAME_DT, VERSION,
    config::{LanConfig, MatchConfig},
    game::{
        ai::choose_play,
        controller::MatchController,
        events::{MatchEvent, MatchEventData},
        progression::InMemoryProfile,
        state::Side,
    },
    network::{
        bridge::{lobby_ready, ping, MatchBridge},
        lan::{LanEvent, LanManager},
    },
};

/// Simulated time after which a match is abandoned.
const MATCH_TIME_LIMIT: f32 = 600.0;

/// Seconds between autopilot plays.
const AUTOPLAY_INTERVAL: f32 = 2.0;

/// How long `join` listens for a host.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Gold Mine v{}", VERSION);

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None | Some("solo") => run_solo(),
        Some("host") => run_host(),
        Some("join") => {
            let addr = args
                .next()
                .map(|a| a.parse::<SocketAddr>().with_context(|| format!("bad address: {a}")))
                .transpose()?;
            run_join(addr)
        }
        Some(other) => bail!("unknown mode {other:?}; expected solo, host or join [addr]"),
    }
}

fn new_controller() -> MatchController {
    MatchController::new(MatchConfig::from_env(), Box::new(InMemoryProfile::new()))
}

/// Play the selected-by-AI card for the local side every few seconds.
struct Autopilot {
    timer: f32,
}

impl Autopilot {
    fn new() -> Self {
        Self { timer: 0.0 }
    }

    fn tick(&mut self, mc: &mut MatchController, dt: f32) {
        self.timer += dt;
        if self.timer < AUTOPLAY_INTERVAL || !mc.is_running() {
            return;
        }
        self.timer = 0.0;

        let config = mc.config().clone();
        let Some(play) = mc.state_mut().and_then(|s| choose_play(s, &config, Side::Player)) else {
            return;
        };
        mc.select_card(play.hand_index);
        mc.player_play_card(play.lane);
    }
}

fn log_events(events: &[MatchEvent]) {
    for event in events {
        match &event.data {
            MatchEventData::EntitySpawned { side, card_id, lane, .. } => {
                info!(t = event.time, side = side.as_str(), card = %card_id, lane, "Spawned");
            }
            MatchEventData::MatchEnded { outcome, xp_gain, gold_gain } => {
                info!(t = event.time, ?outcome, xp_gain, gold_gain, "Match over");
            }
            _ => {}
        }
    }
}

fn log_result(mc: &MatchController) {
    if let Some(snap) = mc.snapshot() {
        info!(
            elapsed = snap.elapsed,
            outcome = ?snap.outcome,
            player_king = snap.player.king_hp,
            enemy_king = snap.enemy.king_hp,
            "Final state"
        );
    }
    let profile = mc.progression();
    info!(level = profile.current_level(), gold = profile.gold(), "Profile");
}

// =============================================================================
// MODES
// =============================================================================

fn run_solo() -> Result<()> {
    let mut mc = new_controller();
    let mut autopilot = Autopilot::new();
    mc.start_match();

    let mut elapsed = 0.0;
    while mc.is_running() && elapsed < MATCH_TIME_LIMIT {
        autopilot.tick(&mut mc, FRAME_DT);
        mc.update(FRAME_DT);
        log_events(&mc.take_events());
        elapsed += FRAME_DT;
    }

    log_result(&mc);
    Ok(())
}

fn run_host() -> Result<()> {
    let config = LanConfig::from_env();
    let mut lan = LanManager::new(config.clone()).context("starting transport")?;
    let addr = lan.start_host().context("starting host")?;
    info!(%addr, "Waiting for a player");

    let mut mc = new_controller();
    let mut bridge = MatchBridge::host(&config);
    let mut autopilot = Autopilot::new();
    let mut started = false;

    loop {
        let frame = Instant::now();

        if !started && bridge.remote_player_name().is_some() {
            lan.set_in_lobby(false);
            if let Some(start) = bridge.start_host_match(&mut mc) {
                lan.send(&start).context("sending match_start")?;
            }
            started = true;
        }
        if started {
            autopilot.tick(&mut mc, FRAME_DT);
        }

        let events = bridge.step(&mut lan, &mut mc, FRAME_DT);
        log_events(&events);

        if let Some(reason) = bridge.take_disconnect() {
            if started {
                warn!(%reason, "Player left mid-match");
                break;
            }
            info!(%reason, "Player left the lobby, waiting for another");
        }
        if started && !mc.is_running() {
            break;
        }
        if mc.state().is_some_and(|s| s.elapsed > MATCH_TIME_LIMIT) {
            mc.abort_match();
            break;
        }
        pace(frame);
    }

    // Let the final sync and result drain
    thread::sleep(Duration::from_millis(250));
    log_result(&mc);
    lan.stop();
    Ok(())
}

fn run_join(addr: Option<SocketAddr>) -> Result<()> {
    let config = LanConfig::from_env();
    let mut lan = LanManager::new(config.clone()).context("starting transport")?;

    let addr = match addr {
        Some(addr) => addr,
        None => discover(&mut lan)?,
    };
    lan.connect(addr).context("connecting")?;

    let mut mc = new_controller();
    let mut bridge = MatchBridge::client(&config);
    let mut autopilot = Autopilot::new();
    let mut greeted = false;
    let mut ping_timer = 0.0;

    loop {
        let frame = Instant::now();

        if !greeted && lan.is_connected() {
            lan.send(&lobby_ready(&config.host_name)).context("sending lobby_ready")?;
            greeted = true;
        }
        if greeted {
            ping_timer += FRAME_DT;
            if ping_timer >= AUTOPLAY_INTERVAL {
                ping_timer = 0.0;
                if let Err(e) = lan.send(&ping()) {
                    debug!(error = %e, "Ping not sent");
                }
            }
        }

        autopilot.tick(&mut mc, FRAME_DT);
        let events = bridge.step(&mut lan, &mut mc, FRAME_DT);
        log_events(&events);

        if mc.state().is_some_and(|s| s.outcome.is_some()) {
            break;
        }
        if let Some(reason) = bridge.take_disconnect() {
            log_result(&mc);
            lan.stop();
            bail!("lost connection to {addr}: {reason}");
        }
        pace(frame);
    }

    log_result(&mc);
    lan.stop();
    Ok(())
}

fn discover(lan: &mut LanManager) -> Result<SocketAddr> {
    let listen = lan.start_discovery().context("starting discovery")?;
    info!(%listen, "Looking for hosts");

    let deadline = Instant::now() + DISCOVERY_TIMEOUT;
    while Instant::now() < deadline {
        for event in lan.poll().events {
            if let LanEvent::HostFound(host) = event {
                info!(addr = %host.addr, name = %host.host_name, "Joining host");
                lan.stop_discovery();
                return Ok(host.addr);
            }
        }
        thread::sleep(Duration::from_millis(100));
    }
    bail!("no host found within {:?}", DISCOVERY_TIMEOUT)
}

fn pace(frame_start: Instant) {
    let budget = Duration::from_secs_f32(FRAME_DT);
    if let Some(rest) = budget.checked_sub(frame_start.elapsed()) {
        thread::sleep(rest);
    }
}
