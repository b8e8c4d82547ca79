use crate::{
    models::{Marketplace, Stage, VariationMode},
    texts::STYLE_PRESETS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetChoice {
    One(Marketplace),
    All,
}

impl TargetChoice {
    pub fn targets(self) -> Vec<Marketplace> {
        match self {
            TargetChoice::One(mp) => vec![mp],
            TargetChoice::All => Marketplace::ALL.to_vec(),
        }
    }
}

/// Button payloads the bot hands out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callback {
    ApproveUtp,
    EditUtp,
    Target(TargetChoice),
    Mode(VariationMode),
    Style(&'static str),
}

impl Callback {
    pub fn parse(data: &str) -> Option<Self> {
        let (kind, value) = data.trim().split_once(':')?;
        match (kind, value) {
            ("utp", "ok") => Some(Callback::ApproveUtp),
            ("utp", "edit") => Some(Callback::EditUtp),
            ("mp", "all") => Some(Callback::Target(TargetChoice::All)),
            ("mp", key) => Marketplace::from_key(key).map(|mp| Callback::Target(TargetChoice::One(mp))),
            ("mode", "uniform" | "series") => Some(Callback::Mode(VariationMode::Uniform)),
            ("mode", "varied" | "different") => Some(Callback::Mode(VariationMode::Varied)),
            ("style", key) => STYLE_PRESETS
                .iter()
                .find(|(preset, _)| *preset == key)
                .map(|(_, style)| Callback::Style(*style)),
            _ => None,
        }
    }

    /// Stage whose prompt offered this button
    pub fn stage(self) -> Stage {
        match self {
            Callback::ApproveUtp | Callback::EditUtp => Stage::AwaitUtpApproval,
            Callback::Target(_) => Stage::AwaitMarketplace,
            Callback::Mode(_) => Stage::AwaitVariation,
            Callback::Style(_) => Stage::AwaitStyle,
        }
    }

    /// A button from a prompt the conversation has already moved past
    pub fn is_stale_at(self, current: Stage) -> bool {
        self.stage() < current
    }
}
