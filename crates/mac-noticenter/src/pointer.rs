//! Pointer save/warp/click primitives for the coordinate strategies.
//!
//! The legacy banner buttons only become clickable once the pointer hovers
//! the banner region, so the coordinate strategies warp the pointer there
//! first and the engine restores it afterwards. Warping does not generate
//! movement events, which is why the cursor sprite is hidden until the
//! user moves the mouse themselves.

use core_graphics::{
    display::CGDisplay,
    event::{CGEvent, CGEventTapLocation, CGEventType, CGMouseButton},
    event_source::{CGEventSource, CGEventSourceStateID},
    geometry::CGPoint,
};
use objc2_app_kit::NSCursor;

use crate::error::{Error, Result};

#[link(name = "CoreGraphics", kind = "framework")]
unsafe extern "C" {
    fn CGWarpMouseCursorPosition(new_position: CGPoint) -> i32;
}

/// A point in global display coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Horizontal coordinate, origin at the main display's top-left.
    pub x: f64,
    /// Vertical coordinate, growing downwards.
    pub y: f64,
}

/// Horizontal inset from the right display edge to the banner button region.
const PANEL_INSET_X: f64 = 70.0;
/// Vertical offset from the top display edge to the banner button region.
const PANEL_TARGET_Y: f64 = 60.0;

/// Current pointer position.
pub fn location() -> Result<Point> {
    let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
        .map_err(|_| Error::EventSource)?;
    let event = CGEvent::new(source).map_err(|_| Error::EventCreate)?;
    let p = event.location();
    Ok(Point { x: p.x, y: p.y })
}

/// Warp the pointer to `to` without generating movement events.
pub fn warp(to: Point) -> Result<()> {
    let err = unsafe { CGWarpMouseCursorPosition(CGPoint::new(to.x, to.y)) };
    if err != 0 {
        return Err(Error::CgCode(err));
    }
    Ok(())
}

/// Hide the cursor sprite until the user next moves the mouse.
pub fn hide_until_move() {
    unsafe { NSCursor::setHiddenUntilMouseMoves(true) };
}

/// Post a synthetic left click at `at` (move, down, up).
pub fn click(at: Point) -> Result<()> {
    let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
        .map_err(|_| Error::EventSource)?;
    let point = CGPoint::new(at.x, at.y);
    for etype in [
        CGEventType::MouseMoved,
        CGEventType::LeftMouseDown,
        CGEventType::LeftMouseUp,
    ] {
        let event = CGEvent::new_mouse_event(source.clone(), etype, point, CGMouseButton::Left)
            .map_err(|_| Error::EventCreate)?;
        event.post(CGEventTapLocation::HID);
    }
    Ok(())
}

/// Fixed warp target near the banner button region of the main display.
/// Banners stack under the menu bar at the right edge on every supported
/// generation; the exact point only needs to land inside the frontmost
/// banner's hover region.
pub fn panel_target() -> Point {
    let bounds = CGDisplay::main().bounds();
    Point {
        x: bounds.origin.x + bounds.size.width - PANEL_INSET_X,
        y: bounds.origin.y + PANEL_TARGET_Y,
    }
}
