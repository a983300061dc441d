mod common;

use std::sync::Arc;

use livekeys_audio::{StaticSampleSource, TestOp};
use livekeys_core::{DeviceClass, InputEvent, SessionStatus};
use livekeys_types::ConnectionId;

use common::*;

#[test]
fn repeated_press_keeps_one_voice() {
    let mut rig = ready_rig(1300);
    let on = rig
        .keyboard
        .handle_input(InputEvent::PointerDown { key: Some(m(60)) });
    assert_eq!(on.len(), 1);
    assert_eq!(rig.keyboard.lane_sounding(local_id()), vec![m(60)]);

    assert!(rig
        .keyboard
        .handle_input(InputEvent::PointerDown { key: Some(m(60)) })
        .is_empty());
    // 'k' is C4 on the desktop home row
    assert!(rig.keyboard.handle_input(InputEvent::KeyDown { key: 'k' }).is_empty());
    assert_eq!(rig.keyboard.lane_sounding(local_id()), vec![m(60)]);
    assert_eq!(rig.backend.live_voices().len(), 1);
    assert_eq!(rig.backend.count(|op| matches!(op, TestOp::StartVoice { .. })), 1);
}

#[test]
fn shrinking_viewport_switches_to_mobile_and_releases() {
    let mut rig = ready_rig(1300);
    let frame = rig.keyboard.frame();
    assert_eq!(frame.device, DeviceClass::Desktop);
    assert_eq!(frame.range.first(), m(48));
    assert_eq!(frame.piano_width, 1200);

    rig.keyboard.handle_input(InputEvent::KeyDown { key: 'a' });
    rig.keyboard.handle_input(InputEvent::PointerDown { key: Some(m(64)) });
    assert_eq!(rig.keyboard.lane_sounding(local_id()), vec![m(48), m(64)]);

    let released = rig.keyboard.set_viewport_width(900);
    assert_eq!(released.len(), 1);
    assert!(!released[0].is_on());
    assert_eq!(released[0].midi(), m(48));

    let frame = rig.keyboard.frame();
    assert_eq!(frame.device, DeviceClass::Mobile);
    assert_eq!(frame.range.first(), m(60));
    assert_eq!(frame.piano_width, 880);
    assert_eq!(frame.keys.len(), 12);
    assert_eq!(rig.keyboard.lane_sounding(local_id()), vec![m(64)]);
    assert_eq!(
        rig.keyboard.session().local().notes.as_slice(),
        &[m(64)]
    );

    // 'a' is now C4
    let on = rig.keyboard.handle_input(InputEvent::KeyDown { key: 'a' });
    assert_eq!(on[0].midi(), m(60));
}

#[test]
fn same_class_resize_only_rescales() {
    let mut rig = ready_rig(1300);
    rig.keyboard.handle_input(InputEvent::KeyDown { key: 'a' });
    assert!(rig.keyboard.set_viewport_width(1600).is_empty());
    assert_eq!(rig.keyboard.frame().piano_width, 1500);
    assert_eq!(rig.keyboard.lane_sounding(local_id()), vec![m(48)]);
}

#[test]
fn instrument_switch_keeps_old_voices_until_ready() {
    let source = Arc::new(GatedSource::new(&["reed_organ"]));
    let mut rig = rig_with(source.clone(), 1300);
    tick_until(&mut rig.keyboard, |k| !k.is_loading());

    // C4 and D4 on the desktop home row
    rig.keyboard.handle_input(InputEvent::KeyDown { key: 'k' });
    rig.keyboard.handle_input(InputEvent::KeyDown { key: 'l' });
    assert_eq!(rig.keyboard.lane_sounding(local_id()), vec![m(60), m(62)]);

    rig.keyboard.set_instrument("organ");
    assert!(rig.keyboard.is_loading());
    assert!(rig.keyboard.frame().loading);
    rig.keyboard.tick();
    assert_eq!(rig.keyboard.lane_sounding(local_id()), vec![m(60), m(62)]);
    assert_eq!(rig.backend.count(|op| matches!(op, TestOp::StopVoice(_))), 0);

    // dropped while loading
    rig.keyboard.handle_input(InputEvent::KeyDown { key: ';' });
    assert_eq!(rig.keyboard.lane_sounding(local_id()), vec![m(60), m(62)]);

    source.open();
    tick_until(&mut rig.keyboard, |k| !k.is_loading());
    assert!(!rig.keyboard.frame().loading);
    assert_eq!(rig.keyboard.lane_instrument(local_id()), Some("organ"));

    rig.keyboard.handle_input(InputEvent::KeyDown { key: '\'' });
    let started = rig.backend.samples_started();
    assert_eq!(started.last().map(String::as_str), Some("reed_organ/F4"));
    assert!(started[..2].iter().all(|s| s.starts_with("acoustic_grand_piano/")));
    assert_eq!(rig.keyboard.lane_sounding(local_id()), vec![m(60), m(62), m(65)]);
}

#[test]
fn failed_fetch_keeps_loading_indicator() {
    let mut rig = rig_with(Arc::new(StaticSampleSource::new()), 1300);
    tick_until(&mut rig.keyboard, |k| k.frame().load_error.is_some());
    for _ in 0..10 {
        rig.keyboard.tick();
    }

    let frame = rig.keyboard.frame();
    assert!(frame.loading);
    assert!(rig.keyboard.is_loading());
    assert!(frame.load_error.unwrap().contains("acoustic_grand_piano"));

    rig.keyboard.handle_input(InputEvent::KeyDown { key: 'k' });
    assert!(rig.keyboard.lane_sounding(local_id()).is_empty());
    assert!(rig.backend.live_voices().is_empty());
}

#[test]
fn closed_channel_silences_remotes_and_goes_offline() {
    let mut rig = ready_rig(1300);
    rig.channel.push_roster(vec![remote(2, "#aa", None, &[])]);
    tick_until(&mut rig.keyboard, |k| k.lane_count() == 2 && !k.is_loading());
    rig.channel.push_roster(vec![remote(2, "#aa", None, &[60, 64])]);
    rig.keyboard.tick();
    assert_eq!(rig.backend.live_voices().len(), 2);
    assert_eq!(rig.keyboard.status(), SessionStatus::Connected);

    rig.channel.close();
    assert!(rig.keyboard.tick());

    assert_eq!(rig.keyboard.status(), SessionStatus::Offline);
    assert_eq!(rig.keyboard.lane_count(), 1);
    assert!(rig.backend.live_voices().is_empty());
    let frame = rig.keyboard.frame();
    assert!(frame.offline);
    assert_eq!(frame.participants.len(), 1);
    assert!(frame.keys.iter().all(|k| !k.active));

    // Solo play carries on
    rig.keyboard.handle_input(InputEvent::KeyDown { key: 'k' });
    assert_eq!(rig.keyboard.lane_sounding(local_id()), vec![m(60)]);
}

#[test]
fn shared_pitch_shows_latest_color_with_two_voices() {
    let mut rig = ready_rig(1300);
    rig.channel.push_roster(vec![
        remote(2, "#f87171", Some("piano"), &[]),
        remote(3, "#22d3ee", None, &[]),
    ]);
    tick_until(&mut rig.keyboard, |k| k.lane_count() == 3 && !k.is_loading());

    rig.channel.push_roster(vec![
        remote(2, "#f87171", Some("piano"), &[64]),
        remote(3, "#22d3ee", None, &[]),
    ]);
    rig.keyboard.tick();
    rig.channel.push_roster(vec![
        remote(2, "#f87171", Some("piano"), &[64]),
        remote(3, "#22d3ee", None, &[64]),
    ]);
    rig.keyboard.tick();

    let frame = rig.keyboard.frame();
    let key = frame.keys.iter().find(|k| k.midi == m(64)).unwrap();
    assert!(key.active);
    assert_eq!(key.color.as_deref(), Some("#22d3ee"));
    assert_eq!(frame.keys.iter().filter(|k| k.active).count(), 1);

    assert_eq!(rig.keyboard.lane_sounding(ConnectionId::new(2)), vec![m(64)]);
    assert_eq!(rig.keyboard.lane_sounding(ConnectionId::new(3)), vec![m(64)]);
    assert_eq!(rig.backend.live_voices().len(), 2);
}

#[test]
fn departed_participant_is_silenced() {
    let mut rig = ready_rig(1300);
    rig.channel.push_roster(vec![remote(2, "#aa", None, &[])]);
    tick_until(&mut rig.keyboard, |k| k.lane_count() == 2 && !k.is_loading());
    rig.channel.push_roster(vec![remote(2, "#aa", None, &[60, 64])]);
    rig.keyboard.tick();
    assert_eq!(rig.backend.live_voices().len(), 2);

    rig.channel.push_roster(Vec::new());
    assert!(rig.keyboard.tick());
    assert_eq!(rig.keyboard.lane_count(), 1);
    assert!(rig.backend.live_voices().is_empty());
    assert_eq!(rig.keyboard.snapshot().len(), 1);
}

#[test]
fn remote_without_notes_gets_no_lane() {
    let mut rig = ready_rig(1300);
    let mut silent = remote(2, "#aa", Some("organ"), &[]);
    silent.presence = None;
    rig.channel.push_roster(vec![silent]);
    rig.keyboard.tick();
    assert_eq!(rig.keyboard.lane_count(), 1);
    assert_eq!(rig.keyboard.frame().participants.len(), 1);
}

#[test]
fn local_presses_are_published() {
    let mut rig = ready_rig(1300);
    rig.keyboard.handle_input(InputEvent::PointerDown { key: Some(m(60)) });
    rig.keyboard.handle_input(InputEvent::PointerMove { key: Some(m(62)) });
    rig.keyboard.handle_input(InputEvent::PointerUp);

    let notes: Vec<Vec<u8>> = rig
        .channel
        .published()
        .into_iter()
        .filter_map(|p| p.notes)
        .map(|n| n.iter().map(|m| m.get()).collect())
        .collect();
    assert_eq!(notes, vec![vec![], vec![60], vec![], vec![62], vec![]]);
}

#[test]
fn setup_required_disables_input() {
    let mut rig = ready_rig(1300);
    rig.keyboard.handle_input(InputEvent::PointerDown { key: Some(m(60)) });
    rig.keyboard.set_status(SessionStatus::SetupRequired);

    assert!(rig.keyboard.session().local().notes.is_empty());
    assert!(rig
        .keyboard
        .handle_input(InputEvent::KeyDown { key: 'k' })
        .is_empty());
    let frame = rig.keyboard.frame();
    assert!(frame.setup_required);
    assert!(frame.disabled);
    assert!(frame.keys.iter().all(|k| !k.active));
}

#[test]
fn shortcut_labels_follow_range() {
    let rig = ready_rig(1300);
    let frame = rig.keyboard.frame();
    let c3 = frame.keys.iter().find(|k| k.midi == m(48)).unwrap();
    assert_eq!(c3.label, Some('a'));
    let b4 = frame.keys.iter().find(|k| k.midi == m(71)).unwrap();
    assert_eq!(b4.label, None);
    assert_eq!(
        rig.keyboard.key_at(1.0, c3.rect.height - 1.0),
        Some(m(48))
    );
}

#[test]
fn shutdown_silences_everything() {
    let mut rig = ready_rig(1300);
    rig.keyboard.handle_input(InputEvent::PointerDown { key: Some(m(60)) });
    rig.keyboard.shutdown();
    assert!(rig.backend.live_voices().is_empty());
    assert_eq!(rig.keyboard.lane_count(), 0);
}
