use std::collections::HashMap;

use crate::{variants::VariantKind, Detections, Quad};

/// Decoded texts merged across variants.
#[derive(Debug, Clone)]
pub struct Aggregate {
    /// Unique non-empty texts in first-seen order with their representative
    /// outline, if any variant located them.
    pub entries: Vec<(String, Option<Quad>)>,
    /// Index into the variant list whose image is used for annotation.
    pub winner: usize,
    pub winner_kind: VariantKind,
}

impl Aggregate {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(text, _)| text.as_str())
    }
}

#[derive(Debug, Default)]
pub struct Aggregator {
    entries: Vec<(String, Option<Quad>)>,
    index: HashMap<String, usize>,
    winner: Option<(usize, VariantKind, usize)>,
    seen: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one variant's detections. Must be called in generation order.
    pub fn push(&mut self, kind: VariantKind, detections: &Detections) {
        let position = self.seen;
        self.seen += 1;

        for (i, text) in detections.texts.iter().enumerate() {
            if text.is_empty() {
                continue;
            }
            let quad = detections.quad_at(i).cloned();
            match self.index.get(text).copied() {
                Some(slot) => {
                    let entry = &mut self.entries[slot].1;
                    if entry.is_none() {
                        *entry = quad;
                    }
                }
                None => {
                    self.index.insert(text.clone(), self.entries.len());
                    self.entries.push((text.clone(), quad));
                }
            }
        }

        let count = detections.quad_count();
        let replace = match self.winner {
            None => true,
            Some((_, _, best)) => count > best,
        };
        if replace {
            self.winner = Some((position, kind, count));
        }
    }

    pub fn finish(mut self, winning: Option<&Detections>) -> Aggregate {
        if let Some(winning) = winning {
            self.prefer_winner_quads(winning);
        }
        let (winner, winner_kind) = self
            .winner
            .map(|(position, kind, _)| (position, kind))
            .unwrap_or((0, VariantKind::Identity));
        Aggregate {
            entries: self.entries,
            winner,
            winner_kind,
        }
    }

    pub fn winner(&self) -> Option<usize> {
        self.winner.map(|(position, _, _)| position)
    }

    fn prefer_winner_quads(&mut self, winning: &Detections) {
        for (i, text) in winning.texts.iter().enumerate() {
            let (Some(&slot), Some(quad)) = (self.index.get(text), winning.quad_at(i)) else {
                continue;
            };
            self.entries[slot].1 = Some(quad.clone());
        }
    }
}

/// Merges per-variant detections given in generation order.
pub fn aggregate(runs: &[(VariantKind, Detections)]) -> Aggregate {
    let mut aggregator = Aggregator::new();
    for (kind, detections) in runs {
        aggregator.push(*kind, detections);
    }
    let winning = aggregator.winner().map(|index| &runs[index].1);
    aggregator.finish(winning)
}
