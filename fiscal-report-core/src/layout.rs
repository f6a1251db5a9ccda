//! # layout: page composition for the report
//!
//! The report is composed into a display list before any PDF bytes exist.
//! A [`Composer`] owns the [`RenderState`] (page index, vertical cursor and
//! page geometry) and every primitive (heading, labeled field, card, divider,
//! paragraph) advances that state through `&mut self`. The finished
//! [`Document`] is a list of pages, each a list of [`DrawCommand`]s, which
//! [`crate::pdf::render`] turns into a PDF.
//!
//! Coordinates are PDF points measured from the top-left corner of the page;
//! text `y` is the baseline.
//!
//! Pagination is automatic: any line that would cross the bottom margin
//! starts a new page first. Cards that overflow continue on the next page and
//! get a background box per page segment.

pub const PT_PER_MM: f32 = 72.0 / 25.4;
pub const A4_WIDTH_MM: f32 = 210.0;
pub const A4_HEIGHT_MM: f32 = 297.0;

const BODY_SIZE: f32 = 10.0;
const HEADING_SIZE: f32 = 14.0;
const CARD_TITLE_SIZE: f32 = 13.0;
const LINE_SPACING: f32 = 1.2;
/// One `move_down` step.
const GAP: f32 = BODY_SIZE * LINE_SPACING;
const CARD_PADDING: f32 = 12.0;
const CARD_TITLE_BAND: f32 = 20.0;
/// Narrowest room left for a field value before it moves under its label.
const MIN_VALUE_WIDTH: f32 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl PageGeometry {
    /// A4 portrait with 40 pt margins.
    pub fn a4() -> Self {
        Self {
            width: A4_WIDTH_MM * PT_PER_MM,
            height: A4_HEIGHT_MM * PT_PER_MM,
            margin: 40.0,
        }
    }

    pub fn content_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    pub fn bottom_limit(&self) -> f32 {
        self.height - self.margin
    }
}

/// Cursor state of a rendering session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    /// Zero-based index of the page being drawn.
    pub current_page: usize,
    /// Distance from the top edge of the page to the next line.
    pub cursor_y: f32,
    /// Extra left offset from the margin (cards pad their content).
    pub indent: f32,
    pub geometry: PageGeometry,
}

impl RenderState {
    fn left(&self) -> f32 {
        self.geometry.margin + self.indent
    }

    fn right(&self) -> f32 {
        self.geometry.width - self.geometry.margin - self.indent
    }

    /// Vertical room left before the bottom margin.
    pub fn remaining(&self) -> f32 {
        self.geometry.bottom_limit() - self.cursor_y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub mod palette {
    use super::Rgb;

    pub const ACCENT: Rgb = Rgb(0x6c, 0x43, 0xd0);
    pub const TEXT: Rgb = Rgb(0x11, 0x11, 0x11);
    pub const LABEL: Rgb = Rgb(0x77, 0x77, 0x77);
    pub const SUBTITLE: Rgb = Rgb(0x66, 0x66, 0x66);
    pub const GROUP: Rgb = Rgb(0x44, 0x44, 0x44);
    pub const PAGE: Rgb = Rgb(0xf4, 0xf5, 0xf9);
    pub const CARD: Rgb = Rgb(0xff, 0xff, 0xff);
    pub const CARD_RULE: Rgb = Rgb(0xe2, 0xe2, 0xe2);
    pub const DIVIDER: Rgb = Rgb(0xe0, 0xe0, 0xe0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Regular,
    Bold,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Rgb,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        color: Rgb,
        thickness: f32,
    },
    Text {
        x: f32,
        y: f32,
        size: f32,
        weight: FontWeight,
        color: Rgb,
        text: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub commands: Vec<DrawCommand>,
}

impl Page {
    /// Visible text of the page, one entry per baseline, fragments on the
    /// same baseline joined by a space.
    pub fn text_lines(&self) -> Vec<String> {
        let mut lines: Vec<(f32, String)> = Vec::new();
        for command in &self.commands {
            if let DrawCommand::Text { y, text, .. } = command {
                match lines.iter_mut().find(|(line_y, _)| (*line_y - *y).abs() < 0.01) {
                    Some((_, line)) => {
                        line.push(' ');
                        line.push_str(text);
                    }
                    None => lines.push((*y, text.clone())),
                }
            }
        }
        lines.into_iter().map(|(_, line)| line).collect()
    }
}

/// A composed report: geometry plus pages of draw commands.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub geometry: PageGeometry,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Visible text of every page in reading order.
    pub fn text_lines(&self) -> Vec<String> {
        self.pages.iter().flat_map(Page::text_lines).collect()
    }

    pub fn contains_line(&self, line: &str) -> bool {
        self.text_lines().iter().any(|l| l == line)
    }
}

/// An open card: where its background box goes once its extent is known.
#[derive(Debug, Clone, Copy)]
struct CardFrame {
    insert_at: usize,
    top: f32,
}

pub struct Composer {
    state: RenderState,
    pages: Vec<Page>,
    open_cards: Vec<CardFrame>,
}

impl Composer {
    pub fn new(geometry: PageGeometry) -> Self {
        let mut composer = Self {
            state: RenderState {
                current_page: 0,
                cursor_y: geometry.margin,
                indent: 0.0,
                geometry,
            },
            pages: Vec::new(),
            open_cards: Vec::new(),
        };
        composer.push_page();
        composer
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    /// Places the cursor at an absolute position on the current page.
    pub fn set_cursor(&mut self, y: f32) {
        self.state.cursor_y = y;
    }

    pub fn move_down(&mut self, lines: f32) {
        self.state.cursor_y += lines * GAP;
    }

    /// Starts a new page, closing the current segment of any open card.
    pub fn new_page(&mut self) {
        let bottom = self.state.geometry.bottom_limit();
        let frames: Vec<CardFrame> = self.open_cards.iter().rev().copied().collect();
        for frame in frames {
            self.insert_card_box(frame, bottom);
        }

        self.state.current_page += 1;
        self.state.cursor_y = self.state.geometry.margin;
        self.push_page();

        let top = self.state.cursor_y;
        for frame in &mut self.open_cards {
            frame.insert_at = 1;
            frame.top = top;
        }
    }

    /// Titled divider for a major section.
    pub fn heading(&mut self, title: &str) {
        self.text_block(title, HEADING_SIZE, FontWeight::Bold, palette::ACCENT);
        self.move_down(1.0);
    }

    /// Smaller title inside a card.
    pub fn sub_heading(&mut self, title: &str, color: Rgb) {
        self.move_down(1.0);
        self.text_block(title, BODY_SIZE, FontWeight::Bold, color);
    }

    /// `label value` on one line; the value wraps under itself when long.
    /// An empty value is replaced by the placeholder.
    pub fn field(&mut self, label: &str, value: &str) {
        let value = if value.trim().is_empty() {
            crate::format::PLACEHOLDER
        } else {
            value
        };
        let left = self.state.left();
        let right = self.state.right();
        let label_width = text_width(label, BODY_SIZE, FontWeight::Regular);
        let space = text_width(" ", BODY_SIZE, FontWeight::Regular);

        let mut value_x = left + label_width + space;
        let mut label_alone = false;
        if right - value_x < MIN_VALUE_WIDTH {
            value_x = left;
            label_alone = true;
        }

        let line_height = BODY_SIZE * LINE_SPACING;
        self.ensure_space(line_height);
        let baseline = self.baseline(BODY_SIZE);
        self.push(DrawCommand::Text {
            x: left,
            y: baseline,
            size: BODY_SIZE,
            weight: FontWeight::Regular,
            color: palette::LABEL,
            text: label.to_string(),
        });
        if label_alone {
            self.state.cursor_y += line_height;
        }

        let lines = wrap(value, right - value_x, BODY_SIZE, FontWeight::Regular);
        for (i, line) in lines.into_iter().enumerate() {
            if i > 0 || label_alone {
                self.ensure_space(line_height);
            }
            let baseline = self.baseline(BODY_SIZE);
            self.push(DrawCommand::Text {
                x: value_x,
                y: baseline,
                size: BODY_SIZE,
                weight: FontWeight::Regular,
                color: palette::TEXT,
                text: line,
            });
            self.state.cursor_y += line_height;
        }
    }

    /// Free text wrapped to the current width.
    pub fn paragraph(&mut self, text: &str) {
        for raw_line in text.lines() {
            self.text_block(raw_line, BODY_SIZE, FontWeight::Regular, palette::TEXT);
        }
    }

    /// Full-width horizontal rule between major sections.
    pub fn divider(&mut self) {
        self.move_down(1.0);
        self.ensure_space(1.0);
        let y = self.state.cursor_y;
        let margin = self.state.geometry.margin;
        let width = self.state.geometry.width;
        self.push(DrawCommand::Line {
            x1: margin,
            y1: y,
            x2: width - margin,
            y2: y,
            color: palette::DIVIDER,
            thickness: 1.0,
        });
        self.move_down(1.0);
    }

    /// A boxed block with a title. `content` draws inside the card with the
    /// card's padding; overflow continues on the next page.
    pub fn card<F>(&mut self, title: &str, content: F)
    where
        F: FnOnce(&mut Composer),
    {
        self.move_down(1.0);
        self.ensure_space(CARD_TITLE_BAND + GAP);

        let box_top = self.state.cursor_y;
        let frame = CardFrame {
            insert_at: self.current_page().commands.len(),
            top: box_top,
        };
        self.open_cards.push(frame);

        let margin = self.state.geometry.margin;
        let width = self.state.geometry.content_width();
        self.push(DrawCommand::Line {
            x1: margin,
            y1: box_top,
            x2: margin + width,
            y2: box_top,
            color: palette::CARD_RULE,
            thickness: 1.0,
        });

        let saved_indent = self.state.indent;
        self.state.indent = saved_indent + CARD_PADDING;
        self.state.cursor_y = box_top + 5.0;
        self.text_block(title, CARD_TITLE_SIZE, FontWeight::Bold, palette::ACCENT);
        self.move_down(0.5);

        content(self);

        self.move_down(0.5);
        self.state.indent = saved_indent;
        if let Some(frame) = self.open_cards.pop() {
            let bottom = self.state.cursor_y.min(self.state.geometry.bottom_limit());
            self.insert_card_box(frame, bottom);
        }
        self.move_down(1.0);
    }

    /// Writes text at an absolute position without moving the cursor.
    pub fn text_at(&mut self, x: f32, y: f32, size: f32, weight: FontWeight, color: Rgb, text: &str) {
        self.push(DrawCommand::Text {
            x,
            y: y + size * 0.8,
            size,
            weight,
            color,
            text: text.to_string(),
        });
    }

    pub fn rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgb) {
        self.push(DrawCommand::Rect {
            x,
            y,
            width,
            height,
            color,
        });
    }

    pub fn finish(mut self) -> Document {
        let bottom = self.state.cursor_y.min(self.state.geometry.bottom_limit());
        let frames: Vec<CardFrame> = self.open_cards.drain(..).rev().collect();
        for frame in frames {
            self.insert_card_box(frame, bottom);
        }
        Document {
            geometry: self.state.geometry,
            pages: self.pages,
        }
    }

    fn text_block(&mut self, text: &str, size: f32, weight: FontWeight, color: Rgb) {
        let left = self.state.left();
        let width = self.state.right() - left;
        let line_height = size * LINE_SPACING;
        for line in wrap(text, width, size, weight) {
            self.ensure_space(line_height);
            let baseline = self.baseline(size);
            self.push(DrawCommand::Text {
                x: left,
                y: baseline,
                size,
                weight,
                color,
                text: line,
            });
            self.state.cursor_y += line_height;
        }
    }

    fn baseline(&self, size: f32) -> f32 {
        self.state.cursor_y + size * 0.8
    }

    fn ensure_space(&mut self, height: f32) {
        if self.state.cursor_y + height > self.state.geometry.bottom_limit() {
            self.new_page();
        }
    }

    fn push_page(&mut self) {
        let geometry = self.state.geometry;
        self.pages.push(Page {
            commands: vec![DrawCommand::Rect {
                x: 0.0,
                y: 0.0,
                width: geometry.width,
                height: geometry.height,
                color: palette::PAGE,
            }],
        });
    }

    fn current_page(&mut self) -> &mut Page {
        let index = self.pages.len() - 1;
        &mut self.pages[index]
    }

    fn push(&mut self, command: DrawCommand) {
        self.current_page().commands.push(command);
    }

    fn insert_card_box(&mut self, frame: CardFrame, bottom: f32) {
        let margin = self.state.geometry.margin;
        let width = self.state.geometry.content_width();
        let height = (bottom - frame.top).max(0.0);
        let page = self.current_page();
        let at = frame.insert_at.min(page.commands.len());
        page.commands.insert(
            at,
            DrawCommand::Rect {
                x: margin,
                y: frame.top,
                width,
                height,
                color: palette::CARD,
            },
        );
    }
}

/// Helvetica advance widths (1/1000 em) for ASCII 32..=126.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

fn char_width(ch: char) -> u16 {
    let code = ch as u32;
    if (32..=126).contains(&code) {
        return HELVETICA_WIDTHS[(code - 32) as usize];
    }
    if ch.is_uppercase() {
        667
    } else {
        556
    }
}

/// Rendered width of `text` in points.
pub fn text_width(text: &str, size: f32, weight: FontWeight) -> f32 {
    let units: u32 = text.chars().map(|c| u32::from(char_width(c))).sum();
    let scale = match weight {
        FontWeight::Regular => 1.0,
        FontWeight::Bold => 1.06,
    };
    units as f32 * size / 1000.0 * scale
}

/// Greedy word wrap; words wider than the line are split by character.
/// Always returns at least one line.
pub fn wrap(text: &str, max_width: f32, size: f32, weight: FontWeight) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if text_width(&candidate, size, weight) <= max_width {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if text_width(word, size, weight) <= max_width {
            current = word.to_string();
            continue;
        }
        for ch in word.chars() {
            current.push(ch);
            if text_width(&current, size, weight) > max_width && current.chars().count() > 1 {
                current.pop();
                lines.push(std::mem::take(&mut current));
                current.push(ch);
            }
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}
