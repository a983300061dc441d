mod common;

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use livekeys_core::{InputEvent, KeyInteractionController, KeyboardLayout, NoteIntent};
use livekeys_types::{KeyboardShortcutMap, MidiNumber, NoteRange, ShortcutLayout};

use common::*;

const SHORTCUT_CHARS: &[char] = &['a', 'w', 's', 'e', 'd', 'f', 'k', 'l', 'z', 'A'];

fn controller() -> KeyInteractionController {
    let range = NoteRange::from_notes("c4", "b4").unwrap();
    let shortcuts = KeyboardShortcutMap::build(&range, ShortcutLayout::HomeRow);
    KeyInteractionController::new(range, shortcuts, KeyboardLayout::Qwerty)
}

fn random_key(rng: &mut StdRng) -> Option<MidiNumber> {
    // occasionally off the keyboard or outside the range
    match rng.gen_range(0..10) {
        0 => None,
        1 => Some(m(72)),
        _ => Some(m(rng.gen_range(60..=71))),
    }
}

fn random_event(rng: &mut StdRng) -> InputEvent {
    let id = rng.gen_range(0..3);
    match rng.gen_range(0..11) {
        0 => InputEvent::PointerDown { key: random_key(rng) },
        1 | 2 => InputEvent::PointerMove { key: random_key(rng) },
        3 => InputEvent::PointerUp,
        4 => InputEvent::PointerLeave,
        5 => InputEvent::TouchStart { id, key: random_key(rng) },
        6 => InputEvent::TouchMove { id, key: random_key(rng) },
        7 => InputEvent::TouchEnd { id },
        8 => InputEvent::TouchCancel { id },
        9 => InputEvent::KeyDown {
            key: SHORTCUT_CHARS[rng.gen_range(0..SHORTCUT_CHARS.len())],
        },
        _ => InputEvent::KeyUp {
            key: SHORTCUT_CHARS[rng.gen_range(0..SHORTCUT_CHARS.len())],
        },
    }
}

#[test]
fn ons_minus_offs_stays_zero_or_one() {
    for seed in 0..50u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut c = controller();
        let mut balance: HashMap<MidiNumber, i32> = HashMap::new();

        for step in 0..400 {
            if step % 97 == 96 {
                c.set_disabled(!c.is_disabled());
            }
            let event = random_event(&mut rng);
            let intents = c.handle(event);

            for intent in &intents {
                let b = balance.entry(intent.midi()).or_insert(0);
                *b += if intent.is_on() { 1 } else { -1 };
                assert!(
                    (0..=1).contains(&*b),
                    "seed {} step {}: balance {} for {} after {:?}",
                    seed,
                    step,
                    b,
                    intent.midi().note_name(),
                    event
                );
            }

            let mut held: Vec<MidiNumber> = balance
                .iter()
                .filter(|&(_, &b)| b == 1)
                .map(|(&midi, _)| midi)
                .collect();
            held.sort();
            let mut active: Vec<MidiNumber> = c.active_notes().iter().collect();
            active.sort();
            assert_eq!(held, active, "seed {} step {}", seed, step);
        }

        for intent in c.release_all() {
            *balance.entry(intent.midi()).or_insert(0) -= 1;
        }
        assert!(balance.values().all(|&b| b == 0), "seed {}", seed);
    }
}

#[test]
fn moves_release_before_pressing() {
    for seed in 100..130u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut c = controller();
        for _ in 0..300 {
            let event = random_event(&mut rng);
            let intents = c.handle(event);
            if matches!(
                event,
                InputEvent::PointerDown { .. }
                    | InputEvent::PointerMove { .. }
                    | InputEvent::TouchMove { .. }
            ) {
                assert!(intents.len() <= 2);
                if intents.len() == 2 {
                    assert!(!intents[0].is_on() && intents[1].is_on());
                }
            }
        }
    }
}

#[test]
fn intents_carry_the_previous_active_set() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut c = controller();
    for _ in 0..500 {
        let before = c.active_notes().clone();
        let intents = c.handle(random_event(&mut rng));
        let mut expected = before;
        for intent in intents {
            assert_eq!(intent.prev_active(), &expected);
            match intent {
                NoteIntent::On { midi, .. } => {
                    expected.insert(midi);
                }
                NoteIntent::Off { midi, .. } => {
                    expected.remove(midi);
                }
            }
        }
        assert_eq!(&expected, c.active_notes());
    }
}

#[test]
fn drag_across_three_keys() {
    let mut c = controller();
    let mut log = Vec::new();
    log.extend(c.handle(InputEvent::PointerDown { key: Some(m(60)) }));
    log.extend(c.handle(InputEvent::PointerMove { key: Some(m(60)) }));
    log.extend(c.handle(InputEvent::PointerMove { key: Some(m(62)) }));
    log.extend(c.handle(InputEvent::PointerMove { key: Some(m(64)) }));
    log.extend(c.handle(InputEvent::PointerUp));

    let trace: Vec<(bool, u8)> = log.iter().map(|i| (i.is_on(), i.midi().get())).collect();
    assert_eq!(
        trace,
        vec![
            (true, 60),
            (false, 60),
            (true, 62),
            (false, 62),
            (true, 64),
            (false, 64)
        ]
    );
}
