//! Deck and Hand
//!
//! Building a shuffled deck, dealing the opening hand and cycling played
//! cards to the back of the draw pile.

use crate::core::rng::MatchRng;
use crate::game::catalog::{basic_cards, find_card, CardDefinition};
use crate::game::state::PartyState;

/// Build a shuffled deck.
///
/// Level 1 players field the basic set; everyone else fields what they own.
/// The deck is padded with copies of the basic set up to `min_size`.
pub fn build_deck(
    owned: &[String],
    level: u32,
    min_size: usize,
    rng: &mut MatchRng,
) -> Vec<&'static CardDefinition> {
    let basics = basic_cards();

    let mut deck: Vec<&'static CardDefinition> = if level <= 1 {
        basics.clone()
    } else {
        owned.iter().filter_map(|id| find_card(id)).collect()
    };

    while deck.len() < min_size && !basics.is_empty() {
        deck.extend(basics.iter().copied());
    }

    rng.shuffle(&mut deck);
    deck
}

/// Deal the opening hand: the first `hand_size` cards in order, the rest
/// become the draw pile.
pub fn deal_hand(party: &mut PartyState, deck: Vec<&'static CardDefinition>, hand_size: usize) {
    party.hand.clear();
    party.deck_queue.clear();
    party.selected_index = 0;
    party.reported_deck_count = None;

    let mut cards = deck.into_iter();
    party.hand.extend(cards.by_ref().take(hand_size));
    party.deck_queue.extend(cards);
}

/// Move the selected card to the back of the draw pile and draw from the
/// front. Hand size never changes.
pub fn rotate_hand(party: &mut PartyState) {
    if party.hand.is_empty() || party.deck_queue.is_empty() {
        return;
    }

    let index = party.selected_index.min(party.hand.len() - 1);
    let played = party.hand.remove(index);
    party.deck_queue.push_back(played);

    if let Some(next) = party.deck_queue.pop_front() {
        party.hand.push(next);
    }

    party.selected_index = index.min(party.hand.len().saturating_sub(1));
}
