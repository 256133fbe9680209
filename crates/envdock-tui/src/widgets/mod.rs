//! Reusable widget abstractions for the TUI

mod text_input;

pub use text_input::TextInputState;

use ratatui::prelude::*;

/// Center a fixed-size rectangle inside the given area, clamped to fit
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect {
        x: area.x + (area.width - w) / 2,
        y: area.y + (area.height - h) / 2,
        width: w,
        height: h,
    }
}

/// Centered rectangle sized as a percentage of the area, with minimums
pub fn popup_rect(pct_w: u16, pct_h: u16, min_w: u16, min_h: u16, area: Rect) -> Rect {
    let w = ((area.width as u32 * pct_w as u32) / 100) as u16;
    let h = ((area.height as u32 * pct_h as u32) / 100) as u16;
    centered_rect(w.max(min_w), h.max(min_h), area)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect_clamps() {
        let area = Rect::new(0, 0, 40, 10);
        let rect = centered_rect(100, 100, area);
        assert_eq!(rect.width, 40);
        assert_eq!(rect.height, 10);
    }

    #[test]
    fn test_centered_rect_centers() {
        let area = Rect::new(0, 0, 40, 10);
        let rect = centered_rect(20, 4, area);
        assert_eq!(rect.x, 10);
        assert_eq!(rect.y, 3);
    }
}
