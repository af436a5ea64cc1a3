use kestrel_deck::config::DeckConfig;
use kestrel_deck::effects::ClearReason;
use kestrel_deck::xr::NoXrRuntime;
use kestrel_deck::Deck;

const DT: f32 = 1.0 / 60.0;

#[test]
fn despawning_an_active_entity_cancels_its_work() {
    let mut deck = Deck::with_default_backends(DeckConfig::default());
    let gear = deck.build_environment().expect("environment").gears[0];
    deck.initialize_blocking(&mut NoXrRuntime);
    let clips_before = deck.animation().clip_count();

    let screen = deck.screen_position(gear).expect("gear on screen");
    deck.queue_pick(screen);
    deck.frame(DT, &mut NoXrRuntime);
    assert!(deck.effects().is_in_flight(gear));

    assert_eq!(deck.despawn(gear).expect("despawn gear"), 1);
    let report = deck.frame(DT, &mut NoXrRuntime);
    assert_eq!(report.cleared.len(), 1);
    assert_eq!(report.cleared[0].entity, gear);
    assert_eq!(report.cleared[0].reason, ClearReason::EntityRemoved);
    assert!(report.reverted.is_empty(), "nothing is written back to a removed entity");
    assert_eq!(deck.animation().pending_feedback(), 0);
    assert_eq!(deck.animation().clip_count(), clips_before - 1);
    assert!(!deck.effects().is_in_flight(gear));

    for _ in 0..30 {
        assert!(deck.frame(DT, &mut NoXrRuntime).reverted.is_empty());
    }
    deck.queue_pick(screen);
    assert!(deck.frame(DT, &mut NoXrRuntime).activations.is_empty(), "removed entity is not pickable");
}

#[test]
fn despawning_the_panel_removes_its_buttons() {
    let mut deck = Deck::with_default_backends(DeckConfig::default());
    let panel = deck.build_environment().expect("environment").control_panel.clone();
    let before = deck.registry().len();
    let removed = deck.despawn(panel.panel).expect("despawn panel");
    assert_eq!(removed, 1 + panel.buttons.len());
    assert_eq!(deck.registry().len(), before - removed);
    assert!(panel.buttons.iter().all(|&button| !deck.registry().contains(button)));
    assert!(deck.despawn(panel.panel).is_err());
}
