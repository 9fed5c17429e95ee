use super::error::DocumentError;

/// Gapless folio sequence generator for one serie.
///
/// Produces folio strings like "00042" for serie "A". Folios must be gapless
/// within a serie; this struct tracks the last issued folio and ensures no
/// gaps.
#[derive(Debug, Clone)]
pub struct FolioSequence {
    series: String,
    next_folio: u64,
    zero_pad: usize,
}

impl FolioSequence {
    /// Create a new sequence starting at 1.
    pub fn new(series: impl Into<String>) -> Self {
        Self {
            series: series.into(),
            next_folio: 1,
            zero_pad: 5,
        }
    }

    /// Create a sequence continuing from a given folio.
    pub fn starting_at(series: impl Into<String>, next_folio: u64) -> Self {
        Self {
            series: series.into(),
            next_folio,
            zero_pad: 5,
        }
    }

    /// Set zero-padding width (default: 5, so "00001").
    pub fn with_padding(mut self, width: usize) -> Self {
        self.zero_pad = width;
        self
    }

    /// Serie this sequence belongs to.
    pub fn series(&self) -> &str {
        &self.series
    }

    /// Generate the next folio, consuming it.
    pub fn next_folio(&mut self) -> String {
        let folio = self.next_folio;
        self.next_folio += 1;
        format!("{:0>width$}", folio, width = self.zero_pad)
    }

    /// Preview the next folio without consuming it.
    pub fn peek(&self) -> String {
        format!("{:0>width$}", self.next_folio, width = self.zero_pad)
    }

    /// Next raw folio number that will be issued.
    pub fn next_raw(&self) -> u64 {
        self.next_folio
    }

    /// Reset to a later folio, e.g. after recovering persisted state. Moving
    /// backwards would reissue folios and is rejected.
    pub fn advance_to(&mut self, folio: u64) -> Result<(), DocumentError> {
        if folio < self.next_folio {
            return Err(DocumentError::Folio(format!(
                "cannot move folio sequence back from {} to {folio}",
                self.next_folio
            )));
        }
        self.next_folio = folio;
        Ok(())
    }
}
