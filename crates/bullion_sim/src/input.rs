//! # Player Input
//!
//! What a client may ask for each tick. The server never trusts more than
//! this: a direction, an aim, and three held buttons.

use serde::{Deserialize, Serialize};

use bullion_shared::Vec2;

/// Current held state of a player's controls.
///
/// `aim_x`/`aim_y` are a direction relative to the player, not a world point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerInput {
    /// Up.
    pub w: bool,
    /// Left.
    pub a: bool,
    /// Down.
    pub s: bool,
    /// Right.
    pub d: bool,
    /// Aim direction, x.
    pub aim_x: f64,
    /// Aim direction, y.
    pub aim_y: f64,
    /// Shoot held.
    pub shoot: bool,
    /// Dash held.
    pub dash: bool,
    /// Exit held.
    pub exit: bool,
}

impl PlayerInput {
    /// Unit movement direction from the WASD keys, or `None` when they
    /// cancel out. Screen convention: `w` is negative y.
    #[must_use]
    pub fn move_dir(&self) -> Option<Vec2> {
        let x = f64::from(i8::from(self.d) - i8::from(self.a));
        let y = f64::from(i8::from(self.s) - i8::from(self.w));
        Vec2::new(x, y).normalized()
    }

    /// Unit aim direction, or `None` for a zero or garbage aim.
    #[must_use]
    pub fn aim_dir(&self) -> Option<Vec2> {
        Vec2::new(self.aim_x, self.aim_y).normalized()
    }
}

/// A partial input update. `None` fields keep their current value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputPatch {
    /// Up.
    pub w: Option<bool>,
    /// Left.
    pub a: Option<bool>,
    /// Down.
    pub s: Option<bool>,
    /// Right.
    pub d: Option<bool>,
    /// Aim direction, x.
    pub aim_x: Option<f64>,
    /// Aim direction, y.
    pub aim_y: Option<f64>,
    /// Shoot held.
    pub shoot: Option<bool>,
    /// Dash held.
    pub dash: Option<bool>,
    /// Exit held.
    pub exit: Option<bool>,
}

impl InputPatch {
    /// A patch that sets every field.
    #[must_use]
    pub const fn full(input: PlayerInput) -> Self {
        Self {
            w: Some(input.w),
            a: Some(input.a),
            s: Some(input.s),
            d: Some(input.d),
            aim_x: Some(input.aim_x),
            aim_y: Some(input.aim_y),
            shoot: Some(input.shoot),
            dash: Some(input.dash),
            exit: Some(input.exit),
        }
    }

    /// Merges into `input`. Non-finite aim components become 0 and huge
    /// ones are clamped; the tick normalises the aim anyway.
    pub fn apply_to(&self, input: &mut PlayerInput) {
        fn merge(slot: &mut bool, value: Option<bool>) {
            if let Some(v) = value {
                *slot = v;
            }
        }
        fn aim(v: f64) -> f64 {
            if v.is_finite() {
                v.clamp(-1.0e6, 1.0e6)
            } else {
                0.0
            }
        }

        merge(&mut input.w, self.w);
        merge(&mut input.a, self.a);
        merge(&mut input.s, self.s);
        merge(&mut input.d, self.d);
        merge(&mut input.shoot, self.shoot);
        merge(&mut input.dash, self.dash);
        merge(&mut input.exit, self.exit);
        if let Some(x) = self.aim_x {
            input.aim_x = aim(x);
        }
        if let Some(y) = self.aim_y {
            input.aim_y = aim(y);
        }
    }
}

impl From<PlayerInput> for InputPatch {
    fn from(input: PlayerInput) -> Self {
        Self::full(input)
    }
}

/// Press/release edges for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edges {
    /// Shoot came up this tick.
    pub shoot_released: bool,
    /// Dash came up this tick.
    pub dash_released: bool,
}

impl Edges {
    /// Edges between the previous tick's input and the current one.
    #[must_use]
    pub const fn between(prev: &PlayerInput, now: &PlayerInput) -> Self {
        Self {
            shoot_released: !now.shoot && prev.shoot,
            dash_released: !now.dash && prev.dash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_merges_only_present_fields() {
        let mut input = PlayerInput {
            w: true,
            shoot: true,
            ..PlayerInput::default()
        };
        let patch = InputPatch {
            d: Some(true),
            shoot: Some(false),
            ..InputPatch::default()
        };
        patch.apply_to(&mut input);
        assert!(input.w && input.d && !input.shoot);
    }

    #[test]
    fn test_garbage_aim_is_zeroed() {
        let mut input = PlayerInput::default();
        InputPatch {
            aim_x: Some(f64::NAN),
            aim_y: Some(f64::INFINITY),
            ..InputPatch::default()
        }
        .apply_to(&mut input);
        assert_eq!((input.aim_x, input.aim_y), (0.0, 0.0));
        assert!(input.aim_dir().is_none());
    }

    #[test]
    fn test_move_dir_and_edges() {
        let input = PlayerInput {
            w: true,
            s: true,
            d: true,
            dash: true,
            ..PlayerInput::default()
        };
        assert_eq!(input.move_dir(), Some(Vec2::X));

        let edges = Edges::between(&PlayerInput::default(), &input);
        assert!(!edges.dash_released && !edges.shoot_released);
        let edges = Edges::between(&input, &input);
        assert_eq!(edges, Edges::default());
        let edges = Edges::between(&input, &PlayerInput::default());
        assert!(edges.dash_released && !edges.shoot_released);
    }
}
