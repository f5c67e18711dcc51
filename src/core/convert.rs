use crate::domain::model::{CanonicalDeck, CardEntry, FormatTag, OutputCard, OutputDeck};
use rand::seq::IndexedRandom;
use rand::Rng;

/// 雙面牌只保留正面名稱："Delver of Secrets // Insectile Aberration" → "Delver of Secrets"
pub fn clean_card_name(name: &str) -> String {
    name.split("//").next().unwrap_or(name).trim().to_string()
}

fn output_card(entry: &CardEntry) -> OutputCard {
    OutputCard {
        quantity: entry.quantity,
        name: clean_card_name(&entry.name),
        set_code: entry.metadata.set_code.clone(),
        collector_number: entry.metadata.collector_number.clone(),
        uuid: entry.metadata.uuid.clone(),
    }
}

pub fn convert(deck: &CanonicalDeck, format: FormatTag) -> OutputDeck {
    convert_with_rng(deck, format, &mut rand::rng())
}

/// 轉成輸出格式。
///
/// 有指揮官時所有指揮官放進 side（數量 1），banner 為第一位指揮官；
/// 沒有指揮官時 side 為空，banner 從主牌中隨機挑一張，主牌為空則是空字串。
/// 原本的 sideboard 不輸出。
pub fn convert_with_rng<R: Rng + ?Sized>(
    deck: &CanonicalDeck,
    format: FormatTag,
    rng: &mut R,
) -> OutputDeck {
    let main: Vec<OutputCard> = deck.mainboard.iter().map(output_card).collect();

    let side: Vec<OutputCard> = deck
        .commanders
        .iter()
        .map(|commander| OutputCard::new(1, clean_card_name(commander)))
        .collect();

    let banner = match side.first() {
        Some(commander) => commander.name.clone(),
        None => {
            if format == FormatTag::Commander {
                tracing::warn!(
                    "⚠️ '{}' is a Commander deck without commanders, picking a random banner",
                    deck.name
                );
            }
            main.choose(rng).map(|card| card.name.clone()).unwrap_or_default()
        }
    };

    OutputDeck {
        name: deck.name.clone(),
        format,
        main,
        side,
        banner,
    }
}
