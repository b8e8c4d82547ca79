use crate::{models::Marketplace, notify::MediaItem};

/// One finished card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub target: Marketplace,
    /// Zero-based position within its target
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Single { bytes: Vec<u8>, caption: String },
    Album(Vec<MediaItem>),
}

fn caption(target: Marketplace) -> String {
    format!("📦 {}", target.label())
}

/// Group outputs into messages: a lone output is one photo, otherwise one message per
/// target (album when the target has several outputs), in the order targets first appear.
pub fn plan_delivery(outputs: Vec<Rendered>) -> Vec<Delivery> {
    if outputs.len() == 1 {
        return outputs
            .into_iter()
            .map(|out| Delivery::Single {
                caption: caption(out.target),
                bytes: out.bytes,
            })
            .collect();
    }

    let mut groups: Vec<(Marketplace, Vec<Rendered>)> = Vec::new();
    for out in outputs {
        match groups.iter_mut().find(|(target, _)| *target == out.target) {
            Some((_, items)) => items.push(out),
            None => groups.push((out.target, vec![out])),
        }
    }

    groups
        .into_iter()
        .map(|(target, mut items)| {
            if items.len() == 1 {
                let out = items.remove(0);
                return Delivery::Single {
                    caption: caption(target),
                    bytes: out.bytes,
                };
            }
            let album = items
                .into_iter()
                .enumerate()
                .map(|(position, out)| MediaItem {
                    caption: (position == 0)
                        .then(|| format!("{} #{}", caption(target), out.index + 1)),
                    bytes: out.bytes,
                })
                .collect();
            Delivery::Album(album)
        })
        .collect()
}
