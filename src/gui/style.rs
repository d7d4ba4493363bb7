use iced::{Background, Border, Color, Shadow, Theme};
use iced::widget::button::{StyleSheet, Appearance};

pub const SUCCESS_COLOR: Color = Color::from_rgb(0.16, 0.5, 0.25);
pub const ERROR_COLOR: Color = Color::from_rgb(0.7, 0.15, 0.15);
pub const MUTED_COLOR: Color = Color::from_rgb(0.45, 0.45, 0.45);

/// Flat row in the device chooser, highlighted on hover.
pub struct ChooserEntryStyleSheet;

impl StyleSheet for ChooserEntryStyleSheet {
    type Style = Theme;

    fn active(&self, _style: &Self::Style) -> Appearance {
        Appearance {
            shadow_offset: Default::default(),
            background: None,
            text_color: Color::BLACK,
            border: Border {
                color: Color::from_rgb(0.85, 0.85, 0.85),
                width: 1.0,
                radius: 4.0.into(),
            },
            shadow: Shadow::default(),
        }
    }

    fn hovered(&self, style: &Self::Style) -> Appearance {
        Appearance {
            background: Some(Background::Color(Color::from_rgb(0.92, 0.94, 0.98))),
            ..self.active(style)
        }
    }
}
