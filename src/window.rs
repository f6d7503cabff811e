//! Predefined window attributes (spec §6) and the in-memory window
//! record the matcher reads them from.
//!
//! Generalizes `toaruwm::core::window::Client`'s attribute fields (and
//! the `Geom`/flags style of `core::types`) into exactly the set spec
//! §4.F names, nothing more — this crate doesn't own window lifecycle,
//! only a read view of the attributes a rule can reference.

use strum_macros::{AsRefStr, EnumIter, EnumString};

/// A leaf target naming one of these is resolved without any X11
/// round-trip — its value lives directly on [`WindowAttrs`].
///
/// `Id`, `Client`, `Leader` are deprecated (spec §4.F, Design Note §9):
/// parsing still accepts them so old rule files keep loading, but the
/// matcher always evaluates them to `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Predefined {
    X,
    Y,
    X2,
    Y2,
    Width,
    Height,
    Widthb,
    Heightb,
    BorderWidth,
    Fullscreen,
    OverrideRedirect,
    Argb,
    Focused,
    GroupFocused,
    Wmwin,
    BoundingShaped,
    RoundedCorners,
    WindowType,
    Name,
    ClassG,
    ClassI,
    Role,
    /// Deprecated.
    Id,
    /// Deprecated.
    Client,
    /// Deprecated.
    Leader,
}

impl Predefined {
    /// Whether this attribute always evaluates to `false` (spec §4.F:
    /// "Three attributes ... are marked deprecated and always return false").
    pub fn is_deprecated(self) -> bool {
        matches!(self, Predefined::Id | Predefined::Client | Predefined::Leader)
    }

    /// Whether the value this attribute holds is a string (vs. numeric).
    pub fn is_string(self) -> bool {
        matches!(
            self,
            Predefined::WindowType | Predefined::Name | Predefined::ClassG | Predefined::ClassI | Predefined::Role
        )
    }
}

/// Bit flags for `_NET_WM_WINDOW_TYPE`-derived state, following
/// `toaruwm`'s `bitflags!` usage in `x/property.rs` for `WmHints`/
/// `WmState`.
bitflags::bitflags! {
    pub struct WindowTypeFlags: u32 {
        const NORMAL       = 0b0000_0000_0001;
        const DIALOG       = 0b0000_0000_0010;
        const UTILITY      = 0b0000_0000_0100;
        const TOOLBAR      = 0b0000_0000_1000;
        const SPLASH       = 0b0000_0001_0000;
        const DOCK         = 0b0000_0010_0000;
        const DESKTOP      = 0b0000_0100_0000;
        const MENU         = 0b0000_1000_0000;
        const POPUP_MENU   = 0b0001_0000_0000;
        const TOOLTIP      = 0b0010_0000_0000;
        const NOTIFICATION = 0b0100_0000_0000;
        const UNKNOWN      = 0b1000_0000_0000;
    }
}

impl WindowTypeFlags {
    /// Name used by the `window_type` predefined attribute's string
    /// comparison (spec §4.F: "matches if any set bit's name matches").
    pub fn names(self) -> Vec<&'static str> {
        let table: &[(WindowTypeFlags, &str)] = &[
            (WindowTypeFlags::NORMAL, "normal"),
            (WindowTypeFlags::DIALOG, "dialog"),
            (WindowTypeFlags::UTILITY, "utility"),
            (WindowTypeFlags::TOOLBAR, "toolbar"),
            (WindowTypeFlags::SPLASH, "splash"),
            (WindowTypeFlags::DOCK, "dock"),
            (WindowTypeFlags::DESKTOP, "desktop"),
            (WindowTypeFlags::MENU, "menu"),
            (WindowTypeFlags::POPUP_MENU, "popup_menu"),
            (WindowTypeFlags::TOOLTIP, "tooltip"),
            (WindowTypeFlags::NOTIFICATION, "notification"),
            (WindowTypeFlags::UNKNOWN, "unknown"),
        ];
        table.iter().filter(|(flag, _)| self.contains(*flag)).map(|(_, name)| *name).collect()
    }
}

/// Geometry, matching `toaruwm::core::types::Geom`'s field set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub border_width: u32,
}

/// The read-only view of a window's predefined attributes the matcher
/// consults directly, with no X11 round-trip (spec §4.F table).
#[derive(Debug, Clone, Default)]
pub struct WindowAttrs {
    pub geometry: Geometry,
    pub fullscreen: bool,
    /// True only if the window has no frame (spec §4.F).
    pub override_redirect: bool,
    /// Has an alpha channel.
    pub argb: bool,
    pub focused: bool,
    pub group_focused: bool,
    pub wmwin: bool,
    pub bounding_shaped: bool,
    pub rounded_corners: bool,
    pub window_type: WindowTypeFlags,
    pub name: String,
    pub class_g: String,
    pub class_i: String,
    pub role: String,
}

impl WindowAttrs {
    pub fn x2(&self) -> i32 {
        self.geometry.x + self.geometry.width as i32
    }

    pub fn y2(&self) -> i32 {
        self.geometry.y + self.geometry.height as i32
    }
}
