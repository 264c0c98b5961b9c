//! Printable prescriptions rendered with `pdf-writer`.
//!
//! Output uses the two standard Helvetica faces (no embedding) under
//! `WinAnsiEncoding`, A4 pages, and a flowing layout that starts a new page
//! when the cursor reaches the bottom margin. Line breaks are measured with
//! the standard Helvetica metrics.

use chrono::{FixedOffset, NaiveDate};
use pdf_writer::{Content, Name, Pdf, Rect, Ref, Str};

use doctor_cell::models::Doctor;
use patient_cell::models::Patient;

use crate::models::{Prescription, PrescriptionItem};

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;
const FOOTER_Y: f32 = 30.0;
const LINE_SPACING: f32 = 1.35;

/// Advance widths in 1/1000 em for U+0020..=U+007E.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Upper bound used for glyphs outside printable ASCII.
const WIDE_GLYPH: u16 = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> Name<'static> {
        match self {
            Font::Regular => Name(b"F1"),
            Font::Bold => Name(b"F2"),
        }
    }

    fn glyph_width(self, ch: char) -> u16 {
        let table = match self {
            Font::Regular => &HELVETICA_WIDTHS,
            Font::Bold => &HELVETICA_BOLD_WIDTHS,
        };
        match ch {
            ' '..='~' => table[ch as usize - 0x20],
            _ => WIDE_GLYPH,
        }
    }

    fn text_width(self, size: f32, text: &str) -> f32 {
        let units: u32 = text.chars().map(|ch| u32::from(self.glyph_width(ch))).sum();
        units as f32 * size / 1000.0
    }
}

/// Everything printed on a prescription, already resolved to text.
#[derive(Debug, Clone)]
pub struct PrescriptionDocument {
    pub reference: i64,
    pub issued_on: NaiveDate,
    pub prescriber: String,
    pub prescriber_details: Vec<String>,
    pub patient_name: String,
    pub patient_details: Vec<String>,
    pub diagnosis: Option<String>,
    pub items: Vec<PrescriptionItem>,
    pub notes: Option<String>,
}

impl PrescriptionDocument {
    pub fn new(
        doctor: &Doctor,
        patient: &Patient,
        prescription: &Prescription,
        clinic_offset: FixedOffset,
    ) -> Self {
        let issued_on = prescription.created_at.with_timezone(&clinic_offset).date_naive();

        let prescriber_details = [
            doctor.specialty.clone(),
            doctor.license_number.as_ref().map(|license| format!("License: {}", license)),
            doctor.clinic_name.clone(),
            doctor.clinic_address.clone(),
            doctor.phone.as_ref().map(|phone| format!("Tel: {}", phone)),
        ]
        .into_iter()
        .flatten()
        .collect();

        let date_of_birth = patient.date_of_birth.map(|dob| match patient.age_on(issued_on) {
            Some(age) => format!("Date of birth: {} (age {})", dob.format("%Y-%m-%d"), age),
            None => format!("Date of birth: {}", dob.format("%Y-%m-%d")),
        });

        let patient_details = [
            date_of_birth,
            patient.gender.as_ref().map(|gender| format!("Gender: {}", gender)),
            patient.allergies.as_ref().map(|allergies| format!("Allergies: {}", allergies)),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self {
            reference: prescription.id,
            issued_on,
            prescriber: doctor.display_name(),
            prescriber_details,
            patient_name: patient.name.clone(),
            patient_details,
            diagnosis: prescription.diagnosis.clone(),
            items: prescription.items.clone(),
            notes: prescription.notes.clone(),
        }
    }
}

pub fn render_prescription_pdf(document: &PrescriptionDocument) -> Vec<u8> {
    let mut layout = Layout::new();

    layout.paragraph(Font::Bold, 18.0, 0.0, &document.prescriber);
    for detail in &document.prescriber_details {
        layout.paragraph(Font::Regular, 10.0, 0.0, detail);
    }
    layout.rule();

    layout.paragraph(Font::Bold, 14.0, 0.0, "Prescription");
    layout.paragraph(
        Font::Regular,
        10.0,
        0.0,
        &format!("Reference #{}    Date: {}", document.reference, document.issued_on.format("%Y-%m-%d")),
    );
    layout.gap(10.0);

    layout.paragraph(Font::Bold, 12.0, 0.0, "Patient");
    layout.paragraph(Font::Regular, 11.0, 0.0, &document.patient_name);
    for detail in &document.patient_details {
        layout.paragraph(Font::Regular, 10.0, 0.0, detail);
    }

    if let Some(diagnosis) = document.diagnosis.as_deref().filter(|d| !d.trim().is_empty()) {
        layout.gap(10.0);
        layout.paragraph(Font::Bold, 12.0, 0.0, "Diagnosis");
        layout.paragraph(Font::Regular, 11.0, 0.0, diagnosis);
    }

    layout.gap(10.0);
    layout.paragraph(Font::Bold, 12.0, 0.0, "Medication");
    for (position, item) in document.items.iter().enumerate() {
        layout.paragraph(Font::Bold, 11.0, 0.0, &format!("{}. {}", position + 1, item.drug_name));

        let mut schedule = format!("{}, {}", item.dosage, item.frequency);
        if let Some(duration) = &item.duration {
            schedule.push_str(&format!(", for {}", duration));
        }
        layout.paragraph(Font::Regular, 10.0, 14.0, &schedule);

        if let Some(instructions) = &item.instructions {
            layout.paragraph(Font::Regular, 10.0, 14.0, instructions);
        }
        layout.gap(4.0);
    }

    if let Some(notes) = document.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        layout.gap(6.0);
        layout.paragraph(Font::Bold, 12.0, 0.0, "Notes");
        layout.paragraph(Font::Regular, 10.0, 0.0, notes);
    }

    layout.gap(36.0);
    layout.paragraph(Font::Regular, 10.0, 0.0, "Signature: ______________________________");
    layout.paragraph(Font::Regular, 10.0, 0.0, &document.prescriber);

    write_pdf(layout.finish())
}

/// Top-down text flow over A4 pages. Each page is a content stream.
struct Layout {
    pages: Vec<Content>,
    current: Content,
    current_used: bool,
    cursor: f32,
}

impl Layout {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: Content::new(),
            current_used: false,
            cursor: PAGE_HEIGHT - MARGIN,
        }
    }

    fn break_page(&mut self) {
        self.pages.push(std::mem::replace(&mut self.current, Content::new()));
        self.current_used = false;
        self.cursor = PAGE_HEIGHT - MARGIN;
    }

    fn ensure_room(&mut self, height: f32) {
        if self.cursor - height < MARGIN {
            self.break_page();
        }
    }

    fn paragraph(&mut self, font: Font, size: f32, indent: f32, text: &str) {
        let line_height = size * LINE_SPACING;
        let max_width = PAGE_WIDTH - 2.0 * MARGIN - indent;
        for line in wrap(text, font, size, max_width) {
            self.ensure_room(line_height);
            self.cursor -= line_height;
            show_line(&mut self.current, font, size, MARGIN + indent, self.cursor, &line);
            self.current_used = true;
        }
    }

    fn rule(&mut self) {
        self.ensure_room(12.0);
        self.cursor -= 6.0;
        self.current
            .set_line_width(0.5)
            .move_to(MARGIN, self.cursor)
            .line_to(PAGE_WIDTH - MARGIN, self.cursor)
            .stroke();
        self.current_used = true;
        self.cursor -= 6.0;
    }

    fn gap(&mut self, height: f32) {
        self.cursor -= height;
    }

    /// Closes the last page and stamps "Page i of n" on every page.
    fn finish(mut self) -> Vec<Content> {
        if self.current_used || self.pages.is_empty() {
            self.pages.push(self.current);
        }

        let total = self.pages.len();
        for (index, page) in self.pages.iter_mut().enumerate() {
            let footer = format!("Page {} of {}", index + 1, total);
            show_line(page, Font::Regular, 8.0, MARGIN, FOOTER_Y, &footer);
        }
        self.pages
    }
}

fn show_line(content: &mut Content, font: Font, size: f32, x: f32, y: f32, text: &str) {
    let encoded = win_ansi(text);
    content
        .begin_text()
        .set_font(font.resource(), size)
        .next_line(x, y)
        .show(Str(&encoded))
        .end_text();
}

/// Greedy word wrap against measured glyph widths. Explicit newlines are
/// kept; words wider than a line are split.
fn wrap(text: &str, font: Font, size: f32, max_width: f32) -> Vec<String> {
    let fits = |candidate: &str| font.text_width(size, candidate) <= max_width;
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();

        for word in paragraph.split_whitespace() {
            let candidate = if line.is_empty() { word.to_string() } else { format!("{} {}", line, word) };
            if fits(&candidate) {
                line = candidate;
                continue;
            }

            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }

            for ch in word.chars() {
                line.push(ch);
                if !fits(&line) && line.chars().count() > 1 {
                    line.pop();
                    lines.push(std::mem::take(&mut line));
                    line.push(ch);
                }
            }
        }

        lines.push(line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Windows-1252 bytes for the text; unmappable characters become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            ' '..='~' | '\u{a0}'..='\u{ff}' => ch as u8,
            '€' => 0x80,
            '‚' => 0x82,
            'ƒ' => 0x83,
            '„' => 0x84,
            '…' => 0x85,
            '†' => 0x86,
            '‡' => 0x87,
            'ˆ' => 0x88,
            '‰' => 0x89,
            'Š' => 0x8a,
            '‹' => 0x8b,
            'Œ' => 0x8c,
            'Ž' => 0x8e,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '˜' => 0x98,
            '™' => 0x99,
            'š' => 0x9a,
            '›' => 0x9b,
            'œ' => 0x9c,
            'ž' => 0x9e,
            'Ÿ' => 0x9f,
            _ => b'?',
        })
        .collect()
}

/// Catalog, page tree, two fonts, then a page and content stream per page.
fn write_pdf(pages: Vec<Content>) -> Vec<u8> {
    let catalog_id = Ref::new(1);
    let page_tree_id = Ref::new(2);
    let regular_id = Ref::new(3);
    let bold_id = Ref::new(4);
    let page_ids: Vec<Ref> = (0..pages.len() as i32).map(|i| Ref::new(5 + 2 * i)).collect();

    let mut pdf = Pdf::new();
    pdf.set_version(1, 4);
    pdf.catalog(catalog_id).pages(page_tree_id);
    pdf.pages(page_tree_id)
        .kids(page_ids.iter().copied())
        .count(page_ids.len() as i32);
    pdf.type1_font(regular_id)
        .base_font(Name(b"Helvetica"))
        .encoding_predefined(Name(b"WinAnsiEncoding"));
    pdf.type1_font(bold_id)
        .base_font(Name(b"Helvetica-Bold"))
        .encoding_predefined(Name(b"WinAnsiEncoding"));

    for (page_id, content) in page_ids.iter().copied().zip(pages) {
        let content_id = Ref::new(page_id.get() + 1);
        {
            let mut page = pdf.page(page_id);
            page.media_box(Rect::new(0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT));
            page.parent(page_tree_id);
            page.contents(content_id);
            page.resources()
                .fonts()
                .pair(Font::Regular.resource(), regular_id)
                .pair(Font::Bold.resource(), bold_id);
        }
        let data = content.finish();
        pdf.stream(content_id, &data);
    }

    pdf.finish()
}
