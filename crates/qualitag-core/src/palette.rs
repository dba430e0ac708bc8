//! Default tag colours and the pickers that choose among them

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Colour assigned to tags created by processing an artifact
pub const PROCESSED_TAG_COLOR: &str = "#000000";

/// Palette used when a tag is created without a colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultColor {
    Slate,
    Mist,
    Sage,
    Cream,
    Navy,
}

impl DefaultColor {
    pub const ALL: [DefaultColor; 5] = [
        DefaultColor::Slate,
        DefaultColor::Mist,
        DefaultColor::Sage,
        DefaultColor::Cream,
        DefaultColor::Navy,
    ];

    pub fn hex(&self) -> &'static str {
        match self {
            DefaultColor::Slate => "#a6aebf",
            DefaultColor::Mist => "#c5d3e8",
            DefaultColor::Sage => "#d0e8c5",
            DefaultColor::Cream => "#fff8de",
            DefaultColor::Navy => "#295f98",
        }
    }
}

/// Chooses a colour for a new tag
pub trait ColorPicker: Send + Sync {
    fn pick(&self) -> &'static str;
}

/// Uniform choice using the thread-local generator
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomColorPicker;

impl ColorPicker for RandomColorPicker {
    fn pick(&self) -> &'static str {
        let index = rand::rng().random_range(0..DefaultColor::ALL.len());
        DefaultColor::ALL[index].hex()
    }
}

/// Reproducible sequence from a fixed seed
#[derive(Debug)]
pub struct SeededColorPicker {
    rng: Mutex<StdRng>,
}

impl SeededColorPicker {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl ColorPicker for SeededColorPicker {
    fn pick(&self) -> &'static str {
        let index = match self.rng.lock() {
            Ok(mut rng) => rng.random_range(0..DefaultColor::ALL.len()),
            Err(poisoned) => poisoned.into_inner().random_range(0..DefaultColor::ALL.len()),
        };
        DefaultColor::ALL[index].hex()
    }
}

/// Always the same colour
#[derive(Debug, Clone, Copy)]
pub struct FixedColorPicker(pub DefaultColor);

impl ColorPicker for FixedColorPicker {
    fn pick(&self) -> &'static str {
        self.0.hex()
    }
}
