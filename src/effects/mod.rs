//! Client-side post-processing of rendered imagery.
//!
//! Effects operate on RGBA pixels after an image has been downloaded: a gain
//! and gamma applied to the normalized colour channels, per-channel range
//! stretching, and an arbitrary custom pixel function. Alpha is never touched
//! by the built-in effects.

pub mod canvas;

use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use canvas::{compose_images, get_blob, get_image_properties, ImageProperties};

/// Range of a colour channel expressed on the `[0, 1]` scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorRange {
    pub from: f64,
    pub to: f64,
}

pub type CustomEffect = Arc<dyn Fn([u8; 4]) -> [u8; 4] + Send + Sync>;

#[derive(Clone, Default)]
pub struct Effects {
    pub gain: Option<f64>,
    pub gamma: Option<f64>,
    pub red_range: Option<ColorRange>,
    pub green_range: Option<ColorRange>,
    pub blue_range: Option<ColorRange>,
    pub custom_effect: Option<CustomEffect>,
}

impl fmt::Debug for Effects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effects")
            .field("gain", &self.gain)
            .field("gamma", &self.gamma)
            .field("red_range", &self.red_range)
            .field("green_range", &self.green_range)
            .field("blue_range", &self.blue_range)
            .field("custom_effect", &self.custom_effect.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl Effects {
    /// Every effect that is set on `other` replaces the one on `self`.
    pub fn override_with(&mut self, other: &Effects) {
        if other.gain.is_some() {
            self.gain = other.gain;
        }
        if other.gamma.is_some() {
            self.gamma = other.gamma;
        }
        if other.red_range.is_some() {
            self.red_range = other.red_range;
        }
        if other.green_range.is_some() {
            self.green_range = other.green_range;
        }
        if other.blue_range.is_some() {
            self.blue_range = other.blue_range;
        }
        if other.custom_effect.is_some() {
            self.custom_effect = other.custom_effect.clone();
        }
    }

    pub fn is_any_effect_set(&self) -> bool {
        is_effect_set(&self.gain)
            || is_effect_set(&self.gamma)
            || is_effect_set(&self.red_range)
            || is_effect_set(&self.green_range)
            || is_effect_set(&self.blue_range)
            || is_effect_set(&self.custom_effect)
    }
}

pub fn is_effect_set<T>(effect: &Option<T>) -> bool {
    effect.is_some()
}

pub fn is_any_effect_set(effects: &Effects) -> bool {
    effects.is_any_effect_set()
}

/// Linear map of `x` from `[old_min, old_max]` to `[new_min, new_max]`,
/// clamped to the new range.
pub fn transform_value_to_range(x: f64, old_min: f64, old_max: f64, new_min: f64, new_max: f64) -> f64 {
    let new_x = new_min + ((new_max - new_min) / (old_max - old_min)) * (x - old_min);
    new_x.max(new_min).min(new_max)
}

fn apply_gain(value: f64, gain: f64) -> f64 {
    let normalized = transform_value_to_range(value, 0.0, 255.0, 0.0, 1.0);
    transform_value_to_range(normalized * gain, 0.0, 1.0, 0.0, 255.0)
}

fn apply_gamma(value: f64, gamma: f64) -> f64 {
    let normalized = transform_value_to_range(value, 0.0, 255.0, 0.0, 1.0);
    transform_value_to_range(normalized.powf(gamma), 0.0, 1.0, 0.0, 255.0)
}

fn apply_range(value: f64, range: &ColorRange) -> f64 {
    transform_value_to_range(value, range.from * 255.0, range.to * 255.0, 0.0, 255.0)
}

/// Applies the effects in place to a buffer of interleaved RGBA pixels.
pub fn apply_effects(rgba: &mut [u8], effects: &Effects) {
    let ranges = [effects.red_range, effects.green_range, effects.blue_range];

    for pixel in rgba.chunks_exact_mut(4) {
        for (channel, range) in ranges.iter().enumerate() {
            let mut value = pixel[channel] as f64;
            if let Some(gain) = effects.gain {
                value = apply_gain(value, gain);
            }
            if let Some(gamma) = effects.gamma {
                value = apply_gamma(value, gamma);
            }
            if let Some(range) = range {
                value = apply_range(value, range);
            }
            pixel[channel] = value.round() as u8;
        }

        if let Some(custom) = &effects.custom_effect {
            let out = custom([pixel[0], pixel[1], pixel[2], pixel[3]]);
            pixel.copy_from_slice(&out);
        }
    }
}

/// Decodes the image, applies the effects and encodes it back to its
/// original format. Without any effect set the bytes are returned as is.
pub fn run_effect_functions(image_bytes: &[u8], effects: &Effects) -> Result<Vec<u8>> {
    if !effects.is_any_effect_set() {
        return Ok(image_bytes.to_vec());
    }

    let mut properties = get_image_properties(image_bytes)?;
    tracing::debug!(
        "Applying effects to {}x{} {} image",
        properties.width,
        properties.height,
        properties.format.as_str()
    );
    apply_effects(&mut properties.rgba, effects);
    get_blob(&properties)
}
