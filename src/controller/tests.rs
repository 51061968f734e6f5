//! Scenario tests for the control core against recording fakes

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;

use super::*;
use crate::config::AppConfig;
use crate::drivers::fake::{Behavior, Fakes};
use crate::drivers::TrackInfo;
use crate::input::InputCommand;
use crate::settings::{Settings, SettingsStore};
use crate::state::{ButtonId, EqBand, PeerId, PlaybackStatus, Source};

struct Rig {
    controller: Arc<Controller>,
    fakes: Fakes,
    dir: tempfile::TempDir,
}

impl Rig {
    fn new() -> Self {
        Self::with(AppConfig::default(), |_| {})
    }

    fn with(config: AppConfig, seed: impl FnOnce(&mut Settings)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = Settings::default();
        seed(&mut settings);
        std::fs::write(&path, serde_json::to_vec(&settings).unwrap()).unwrap();

        let (store, _) = SettingsStore::open(&path);
        let fakes = Fakes::new();
        let controller = Controller::new(store, fakes.collaborators(), &config);
        Self {
            controller,
            fakes,
            dir,
        }
    }

    fn secondary() -> Self {
        Self::with(AppConfig::default(), |s| s.source = Source::Secondary)
    }

    fn on_disk(&self) -> Settings {
        let raw = std::fs::read(self.dir.path().join("settings.json")).unwrap();
        serde_json::from_slice(&raw).unwrap()
    }
}

// ===== Volume =====

#[tokio::test]
async fn test_set_volume_clamps_pushes_and_persists() {
    let rig = Rig::new();

    assert_eq!(rig.controller.set_volume(150, true).await, 100);
    assert_eq!(rig.controller.volume(), 100);
    assert_eq!(rig.fakes.primary.count("set_volume 100"), 1);
    assert_eq!(rig.on_disk().volume, 100);
    assert_eq!(rig.fakes.indicators.volumes.lock().last(), Some(&100));

    assert_eq!(rig.controller.set_volume(-3, true).await, 0);
    assert_eq!(rig.on_disk().volume, 0);
}

#[tokio::test]
async fn test_adjust_volume_saturates_at_100() {
    let rig = Rig::with(AppConfig::default(), |s| s.volume = 70);

    let mut applied = Vec::new();
    for _ in 0..5 {
        applied.push(rig.controller.adjust_volume(5).await);
    }
    assert_eq!(applied, vec![75, 80, 85, 90, 95]);
    assert_eq!(rig.controller.adjust_volume(5).await, 100);
    assert_eq!(rig.controller.adjust_volume(5).await, 100);
    assert_eq!(rig.controller.adjust_volume(i32::MIN).await, 0);
}

#[tokio::test]
async fn test_volume_goes_to_secondary_when_current() {
    let rig = Rig::secondary();

    rig.controller.set_volume(40, true).await;
    assert_eq!(rig.fakes.secondary.state.lock().volume, Some(40));
    assert_eq!(rig.fakes.primary.count("set_volume 40"), 0);
}

#[tokio::test]
async fn test_sync_volume_reads_primary_without_pushing_back() {
    let rig = Rig::new();
    rig.fakes.primary.set_session(true, PlaybackStatus::Playing);
    rig.fakes.primary.state.lock().volume = 33;

    rig.controller.sync_volume().await;

    assert_eq!(rig.controller.volume(), 33);
    assert_eq!(rig.on_disk().volume, 33);
    assert!(rig
        .fakes
        .primary
        .calls()
        .iter()
        .all(|c| !c.starts_with("set_volume")));
}

#[tokio::test]
async fn test_sync_volume_skipped_without_session() {
    let rig = Rig::new();
    rig.fakes.primary.state.lock().volume = 12;

    rig.controller.sync_volume().await;

    assert_eq!(rig.controller.volume(), 50);
    assert_eq!(rig.fakes.primary.count("volume"), 0);
}

#[tokio::test]
async fn test_concurrent_steps_are_not_lost() {
    let rig = Rig::with(AppConfig::default(), |s| s.volume = 10);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let controller = rig.controller.clone();
        tasks.push(tokio::spawn(async move { controller.adjust_volume(5).await }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(rig.controller.volume(), 50);
}

// ===== EQ =====

#[tokio::test]
async fn test_negative_preset_sends_inverted_gains() {
    let rig = Rig::new();

    rig.controller.set_eq_gain(EqBand::Bass, -3).await;

    let sent = rig.fakes.mixer.take();
    assert_eq!(sent.len(), 7);
    assert!(sent.iter().all(|(_, v)| *v == (1.0 - 0.54f64) as f32));
    assert_eq!(rig.on_disk().current_eq_bass, -3);
    assert_eq!(rig.controller.eq_preset().bass, -3);
}

#[tokio::test]
async fn test_out_of_range_preset_is_clamped() {
    let rig = Rig::new();

    rig.controller.set_eq_gain(EqBand::Treble, 9).await;

    assert_eq!(rig.controller.eq_preset().treble, 6);
    assert_eq!(rig.fakes.mixer.take().len(), 6);
}

#[tokio::test]
async fn test_applying_preset_twice_is_identical() {
    let rig = Rig::new();

    rig.controller.apply_eq_preset(EqBand::Treble, -5).await;
    let first = rig.fakes.mixer.take();
    rig.controller.apply_eq_preset(EqBand::Treble, -5).await;
    let second = rig.fakes.mixer.take();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_eq_off_flattens_and_on_restores() {
    let rig = Rig::with(AppConfig::default(), |s| {
        s.current_eq_bass = 4;
        s.current_eq_treble = -2;
    });

    rig.controller.set_eq_enabled(false).await;
    let flat = rig.fakes.mixer.take();
    assert_eq!(flat.len(), 13);
    assert!(flat.iter().all(|(_, v)| *v == 0.5));
    assert_eq!(rig.controller.eq_preset().bass, 4);
    assert!(!rig.on_disk().eq_enabled);

    // Stored only while disabled
    rig.controller.set_eq_gain(EqBand::Bass, 5).await;
    assert!(rig.fakes.mixer.take().is_empty());

    rig.controller.set_eq_enabled(true).await;
    let restored = rig.fakes.mixer.take();
    assert_eq!(restored.len(), 13);
    assert!(restored.contains(&(14, 0.57f64 as f32)));
    assert!(restored.contains(&(54, (1.0 - 0.53f64) as f32)));
}

#[tokio::test]
async fn test_broken_table_sends_nothing_for_that_band() {
    let rig = Rig::with(AppConfig::default(), |s| {
        let mut table = crate::settings::GainTable::new();
        table.insert("99".into(), 0.5);
        s.eq_presets.insert("bass", 1, table);
    });

    rig.controller.set_eq_gain(EqBand::Bass, 1).await;
    assert!(rig.fakes.mixer.take().is_empty());
    assert_eq!(rig.controller.eq_preset().bass, 1);

    rig.controller.set_eq_gain(EqBand::Treble, 1).await;
    assert_eq!(rig.fakes.mixer.take().len(), 6);
}

// ===== Arbitration =====

#[tokio::test]
async fn test_lost_primary_opens_secondary() {
    let rig = Rig::new();

    rig.controller.tick().await;

    assert_eq!(rig.controller.current_source(), Source::Secondary);
    assert_eq!(rig.on_disk().source, Source::Secondary);
    let secondary = rig.fakes.secondary.state.lock();
    assert_eq!(secondary.radio, Some(true));
    assert_eq!(secondary.discoverable, Some(true));
    drop(secondary);
    assert_eq!(rig.fakes.indicators.pulse_count(), 1);
}

#[tokio::test]
async fn test_primary_takes_over_within_one_tick() {
    let mut config = AppConfig::default();
    config.audio.chime = Some("/usr/share/sounds/ready.wav".into());
    let rig = Rig::with(config, |s| s.source = Source::Secondary);
    rig.fakes.secondary.connect("AA:AA");
    rig.controller.tick().await;
    assert_eq!(
        rig.controller.secondary_owner(),
        Some(PeerId::new("AA:AA"))
    );

    rig.fakes.primary.set_session(true, PlaybackStatus::Playing);
    rig.controller.tick().await;

    assert_eq!(rig.controller.current_source(), Source::Primary);
    assert_eq!(rig.fakes.secondary.state.lock().radio, Some(false));
    assert!(rig
        .fakes
        .system
        .calls()
        .contains(&"play_sound /usr/share/sounds/ready.wav".to_string()));
    assert_eq!(rig.fakes.indicators.last_mute(), Some(false));
}

#[tokio::test]
async fn test_chime_respects_sounds_setting() {
    let mut config = AppConfig::default();
    config.audio.chime = Some("/tmp/chime.wav".into());
    let rig = Rig::with(config, |s| {
        s.source = Source::Secondary;
        s.sounds = false;
    });
    rig.fakes.primary.set_session(true, PlaybackStatus::Playing);

    rig.controller.tick().await;

    assert_eq!(rig.controller.current_source(), Source::Primary);
    assert!(rig.fakes.system.calls().is_empty());
}

#[tokio::test]
async fn test_steady_state_has_no_side_effects() {
    let rig = Rig::new();
    rig.fakes.primary.set_session(true, PlaybackStatus::Playing);

    rig.controller.tick().await;
    rig.controller.tick().await;

    assert_eq!(rig.controller.current_source(), Source::Primary);
    assert!(rig.fakes.secondary.calls().is_empty());
    assert_eq!(rig.fakes.indicators.pulse_count(), 0);
}

#[tokio::test]
async fn test_tick_reads_primary_status_once() {
    let rig = Rig::new();
    rig.fakes.primary.set_session(true, PlaybackStatus::Paused);

    rig.controller.tick().await;

    assert_eq!(rig.fakes.primary.state.lock().status_reads, 1);
    assert_eq!(rig.fakes.indicators.last_mute(), Some(true));
}

#[tokio::test]
async fn test_mute_follows_primary_status() {
    let rig = Rig::new();

    for (status, muted) in [
        (PlaybackStatus::Playing, false),
        (PlaybackStatus::Paused, true),
        (PlaybackStatus::Stopped, true),
        (PlaybackStatus::Unknown, true),
    ] {
        rig.fakes.primary.set_session(true, status);
        rig.controller.tick().await;
        assert_eq!(rig.fakes.indicators.last_mute(), Some(muted), "{:?}", status);
    }
}

#[tokio::test]
async fn test_mute_on_secondary_follows_stack_and_owner() {
    let rig = Rig::secondary();

    rig.controller.tick().await;
    assert_eq!(rig.fakes.indicators.last_mute(), Some(true));

    rig.fakes.secondary.connect("AA:AA");
    rig.controller.tick().await; // admits
    rig.controller.tick().await;
    assert_eq!(rig.fakes.indicators.last_mute(), Some(false));

    rig.fakes.secondary.state.lock().status = PlaybackStatus::Paused;
    rig.controller.tick().await;
    assert_eq!(rig.fakes.indicators.last_mute(), Some(true));

    rig.fakes.secondary.state.lock().status = PlaybackStatus::Playing;
    rig.controller.tick().await;
    assert_eq!(rig.fakes.indicators.last_mute(), Some(false));
}

// ===== Admission =====

#[tokio::test]
async fn test_first_peer_is_admitted_and_others_evicted() {
    let rig = Rig::secondary();

    rig.fakes.secondary.connect("AA:AA");
    rig.controller.tick().await;
    assert_eq!(
        rig.controller.secondary_owner(),
        Some(PeerId::new("AA:AA"))
    );
    assert_eq!(rig.fakes.secondary.count("discoverable false"), 1);
    assert_eq!(rig.fakes.secondary.count("pairable false"), 1);

    rig.fakes.secondary.connect("BB:BB");
    rig.controller.tick().await;
    assert_eq!(rig.fakes.secondary.count("disconnect BB:BB"), 1);
    assert_eq!(
        rig.controller.secondary_owner(),
        Some(PeerId::new("AA:AA"))
    );
    assert_eq!(rig.fakes.secondary.peers(), vec![PeerId::new("AA:AA")]);
}

#[tokio::test]
async fn test_admission_is_idempotent() {
    let rig = Rig::secondary();
    rig.fakes.secondary.connect("AA:AA");

    rig.controller.tick().await;
    rig.fakes.secondary.clear_calls();
    rig.controller.tick().await;
    rig.controller.tick().await;

    assert!(rig.fakes.secondary.calls().is_empty());
}

#[tokio::test]
async fn test_simultaneous_peers_resolve_in_one_pass() {
    let rig = Rig::secondary();
    rig.fakes.secondary.connect("AA:AA");
    rig.fakes.secondary.connect("BB:BB");
    rig.fakes.secondary.connect("CC:CC");

    rig.controller.enforce_admission().await;

    assert_eq!(
        rig.controller.secondary_owner(),
        Some(PeerId::new("AA:AA"))
    );
    assert_eq!(rig.fakes.secondary.count("disconnect BB:BB"), 1);
    assert_eq!(rig.fakes.secondary.count("disconnect CC:CC"), 1);
}

#[tokio::test]
async fn test_departed_owner_reopens_channel() {
    let rig = Rig::secondary();
    rig.fakes.secondary.connect("AA:AA");
    rig.controller.tick().await;

    rig.fakes.secondary.drop_peer("AA:AA");
    rig.fakes.secondary.connect("BB:BB");
    rig.controller.enforce_admission().await;

    assert_eq!(rig.controller.secondary_owner(), None);
    assert_eq!(rig.fakes.secondary.count("discoverable true"), 1);
    assert_eq!(rig.fakes.secondary.count("disconnect BB:BB"), 0);

    rig.controller.enforce_admission().await;
    assert_eq!(
        rig.controller.secondary_owner(),
        Some(PeerId::new("BB:BB"))
    );
}

#[tokio::test]
async fn test_admission_ignored_on_primary() {
    let rig = Rig::new();
    rig.fakes.secondary.connect("AA:AA");

    rig.controller.enforce_admission().await;

    assert_eq!(rig.controller.secondary_owner(), None);
}

#[tokio::test]
async fn test_failed_peer_query_changes_nothing() {
    let rig = Rig::secondary();
    rig.fakes.secondary.connect("AA:AA");
    rig.fakes.secondary.set_behavior(Behavior::Fail);

    rig.controller.tick().await;

    assert_eq!(rig.controller.secondary_owner(), None);
    assert_eq!(rig.controller.current_source(), Source::Secondary);
}

// ===== Idle disconnect =====

#[tokio::test(start_paused = true)]
async fn test_pause_arms_and_resume_cancels_idle_timer() {
    let rig = Rig::new();

    rig.fakes.primary.set_session(true, PlaybackStatus::Playing);
    rig.controller.tick().await;
    assert!(!rig.controller.idle_disconnect_armed());

    rig.fakes.primary.set_session(true, PlaybackStatus::Paused);
    rig.controller.tick().await;
    assert!(rig.controller.idle_disconnect_armed());

    sleep(Duration::from_secs(100)).await;
    rig.fakes.primary.set_session(true, PlaybackStatus::Playing);
    rig.controller.tick().await;
    assert!(!rig.controller.idle_disconnect_armed());

    sleep(Duration::from_secs(400)).await;
    assert_eq!(rig.fakes.primary.count("disconnect_session"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_staying_paused_disconnects_exactly_once() {
    let rig = Rig::new();
    rig.fakes.primary.set_session(true, PlaybackStatus::Paused);
    let start = tokio::time::Instant::now();

    rig.controller.tick().await;
    let deadline = rig.controller.idle_disconnect_deadline();
    assert_eq!(deadline, Some(start + Duration::from_secs(300)));
    sleep(Duration::from_secs(120)).await;
    rig.controller.tick().await;
    // Still paused: the running timer is kept, not restarted
    assert_eq!(rig.controller.idle_disconnect_deadline(), deadline);
    sleep(Duration::from_secs(179)).await;
    assert_eq!(rig.fakes.primary.count("disconnect_session"), 0);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(rig.fakes.primary.count("disconnect_session"), 1);
    assert!(!rig.controller.idle_disconnect_armed());

    sleep(Duration::from_secs(600)).await;
    assert_eq!(rig.fakes.primary.count("disconnect_session"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_switch_to_secondary_cancels_idle_timer() {
    let rig = Rig::new();
    rig.fakes.primary.set_session(true, PlaybackStatus::Paused);
    rig.controller.tick().await;
    assert!(rig.controller.idle_disconnect_armed());

    rig.fakes.primary.set_session(false, PlaybackStatus::Stopped);
    rig.controller.tick().await;

    assert_eq!(rig.controller.current_source(), Source::Secondary);
    assert!(!rig.controller.idle_disconnect_armed());
}

// ===== Collaborator failures =====

#[tokio::test(start_paused = true)]
async fn test_hanging_primary_times_out_and_counts_as_offline() {
    let rig = Rig::new();
    rig.fakes.primary.set_behavior(Behavior::Hang);

    rig.controller.tick().await;

    assert_eq!(rig.controller.current_source(), Source::Secondary);
}

#[tokio::test(start_paused = true)]
async fn test_failing_collaborators_never_abort_operations() {
    let rig = Rig::new();
    rig.fakes.primary.set_behavior(Behavior::Fail);
    rig.fakes.secondary.set_behavior(Behavior::Fail);

    assert_eq!(rig.controller.set_volume(30, true).await, 30);
    rig.controller.media_action(MediaAction::Next).await;
    rig.controller.tick().await;
    rig.controller.tick().await;

    assert_eq!(rig.controller.volume(), 30);
    assert_eq!(rig.on_disk().volume, 30);
}

// ===== Media actions =====

#[tokio::test(start_paused = true)]
async fn test_transport_routes_to_current_source() {
    let rig = Rig::new();
    rig.controller.media_action(MediaAction::PlayPause).await;
    assert_eq!(rig.fakes.primary.count("PlayPause"), 1);
    assert_eq!(rig.fakes.indicators.pulse_count(), 1);

    let rig = Rig::secondary();
    rig.controller.media_action(MediaAction::Prev).await;
    assert_eq!(rig.fakes.secondary.count("Previous"), 1);
    assert_eq!(rig.fakes.primary.count("Previous"), 0);
    assert_eq!(rig.fakes.indicators.pulse_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_pairing_mode_clears_and_opens() {
    let rig = Rig::secondary();
    rig.fakes.secondary.connect("AA:AA");
    rig.controller.tick().await;
    rig.fakes.indicators.clear();

    rig.controller.media_action(MediaAction::PairingMode).await;

    assert_eq!(rig.controller.secondary_owner(), None);
    assert!(rig.fakes.secondary.peers().is_empty());
    let secondary = rig.fakes.secondary.state.lock();
    assert_eq!(secondary.radio, Some(true));
    assert_eq!(secondary.discoverable, Some(true));
    assert_eq!(secondary.pairable, Some(true));
    drop(secondary);
    assert_eq!(rig.fakes.indicators.pulse_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_long_press_on_primary_kicks_client() {
    let rig = Rig::new();
    rig.fakes.primary.set_session(true, PlaybackStatus::Playing);

    rig.controller.long_press().await;

    assert_eq!(rig.fakes.primary.count("disconnect_session"), 1);
    assert_eq!(rig.fakes.secondary.count("pairable true"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_long_press_on_secondary_pairs_then_kicks() {
    let rig = Rig::secondary();

    rig.controller.long_press().await;

    assert_eq!(rig.fakes.secondary.count("pairable true"), 1);
    assert_eq!(rig.fakes.primary.count("disconnect_session"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_tap_counts_dispatch_one_action() {
    let rig = Rig::new();

    for (taps, call) in [(1, "PlayPause"), (2, "Next"), (3, "Previous"), (5, "Previous")] {
        rig.fakes.primary.clear_calls();
        rig.controller.handle_input(InputCommand::PlayTaps(taps)).await;
        sleep(Duration::from_secs(1)).await;
        assert_eq!(rig.fakes.primary.calls(), vec![call.to_string()], "{} taps", taps);
    }
}

#[tokio::test(start_paused = true)]
async fn test_volume_step_command_pulses() {
    let rig = Rig::new();

    rig.controller
        .handle_input(InputCommand::VolumeStep(-5))
        .await;

    assert_eq!(rig.controller.volume(), 45);
    assert_eq!(rig.fakes.indicators.pulse_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_ramp_step_needs_button_priority() {
    let rig = Rig::new();

    rig.controller
        .handle_input(InputCommand::RampStep(ButtonId::VolumeUp, 5))
        .await;
    assert_eq!(rig.controller.volume(), 50);
    assert_eq!(rig.fakes.indicators.pulse_count(), 0);

    rig.controller.force_claim_button(ButtonId::VolumeUp);
    rig.controller
        .handle_input(InputCommand::RampStep(ButtonId::VolumeUp, 5))
        .await;
    assert_eq!(rig.controller.volume(), 55);

    // Down took over: queued up-steps are stale
    rig.controller.force_claim_button(ButtonId::VolumeDown);
    rig.controller
        .handle_input(InputCommand::RampStep(ButtonId::VolumeUp, 5))
        .await;
    assert_eq!(rig.controller.volume(), 55);
}

// ===== Snapshots, boot and persistence =====

#[tokio::test]
async fn test_full_state_uses_current_source_metadata() {
    let rig = Rig::secondary();
    {
        let mut secondary = rig.fakes.secondary.state.lock();
        secondary.status = PlaybackStatus::Playing;
        secondary.track = TrackInfo {
            title: "Song".into(),
            position_sec: 12.5,
            ..TrackInfo::default()
        };
    }

    let full = rig.controller.full_state().await;
    assert_eq!(full.mode, Source::Secondary);
    assert_eq!(full.status, PlaybackStatus::Playing);
    assert_eq!(full.track.title, "Song");
    assert_eq!(full.volume, 50);

    let partial = rig.controller.partial_state().await;
    assert_eq!(partial.position, 12.5);
    assert_eq!(partial.status, PlaybackStatus::Playing);
}

#[tokio::test]
async fn test_partial_state_syncs_primary_volume() {
    let rig = Rig::new();
    rig.fakes.primary.set_session(true, PlaybackStatus::Playing);
    rig.fakes.primary.state.lock().volume = 64;

    let partial = rig.controller.partial_state().await;

    assert_eq!(partial.volume, 64);
    assert_eq!(partial.status, PlaybackStatus::Playing);
}

#[tokio::test]
async fn test_state_survives_restart() {
    let rig = Rig::new();
    rig.controller.set_volume(35, true).await;
    rig.controller.set_eq_gain(EqBand::Treble, -4).await;
    rig.controller.tick().await; // no primary session: secondary
    rig.controller.settings().flush().await.unwrap();

    let (store, _) = SettingsStore::open(rig.dir.path().join("settings.json"));
    let restarted = Controller::new(store, Fakes::new().collaborators(), &AppConfig::default());

    assert_eq!(restarted.volume(), 35);
    assert_eq!(restarted.eq_preset().treble, -4);
    assert_eq!(restarted.current_source(), Source::Secondary);
}

#[tokio::test]
async fn test_boot_restores_appliance() {
    let rig = Rig::with(AppConfig::default(), |s| {
        s.volume = 42;
        s.eq_enabled = false;
    });

    rig.controller.boot(80, "Setup").await;

    assert_eq!(rig.fakes.indicators.mute.lock().first(), Some(&true));
    assert_eq!(
        rig.fakes.system.calls(),
        vec![
            "set_hardware_volume 0".to_string(),
            "start_primary_daemon 42".to_string(),
            "set_hardware_volume 80".to_string(),
            "start_hotspot Setup".to_string(),
        ]
    );
    let flat = rig.fakes.mixer.take();
    assert_eq!(flat.len(), 13);
    assert!(flat.iter().all(|(_, v)| *v == 0.5));
}

#[tokio::test]
async fn test_boot_skips_hotspot_when_wifi_known() {
    let rig = Rig::with(AppConfig::default(), |s| s.wifi.ssid = "home".into());

    rig.controller.boot(80, "Setup").await;

    assert!(!rig
        .fakes
        .system
        .calls()
        .iter()
        .any(|c| c.starts_with("start_hotspot")));
}

// ===== Supervisory loop =====

#[tokio::test(start_paused = true)]
async fn test_loop_ticks_and_stops() {
    let rig = Rig::secondary();
    let (_commands, command_rx) = mpsc::channel(8);
    let (stop, shutdown) = watch::channel(false);
    let task = tokio::spawn(rig.controller.clone().run(command_rx, shutdown));

    rig.fakes.primary.set_session(true, PlaybackStatus::Playing);
    sleep(Duration::from_millis(2100)).await;
    assert_eq!(rig.controller.current_source(), Source::Primary);

    stop.send(true).unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_loop_handles_commands_and_wake() {
    let rig = Rig::new();
    rig.fakes.primary.set_session(true, PlaybackStatus::Playing);
    let (commands, command_rx) = mpsc::channel(8);
    let (stop, shutdown) = watch::channel(false);
    let task = tokio::spawn(rig.controller.clone().run(command_rx, shutdown));
    sleep(Duration::from_millis(10)).await;

    commands.send(InputCommand::VolumeStep(5)).await.unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(rig.controller.volume(), 55);

    rig.fakes.primary.set_session(true, PlaybackStatus::Paused);
    rig.controller.request_tick();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(rig.fakes.indicators.last_mute(), Some(true));

    stop.send(true).unwrap();
    task.await.unwrap();
}

// ===== Laws =====

mod laws {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_set_volume_clamps(target in any::<i32>()) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let applied = runtime.block_on(async {
                let rig = Rig::new();
                let applied = rig.controller.set_volume(target, true).await;
                (applied, rig.controller.volume())
            });

            let expected = target.clamp(0, 100) as u8;
            prop_assert_eq!(applied, (expected, expected));
        }
    }
}
