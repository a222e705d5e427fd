use crate::schema::Table;
use unicode_width::UnicodeWidthStr;

/// Approximate text metrics of the canvas renderer, used to estimate how
/// much room a table box takes.
#[derive(Debug, Clone)]
pub struct TextMetrics {
    pub char_width: f64,
    pub line_height: f64,
    pub padding_x: f64,
    pub padding_y: f64,
    pub header_padding: f64,
    pub min_node_width: f64,
    pub min_node_height: f64,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self {
            char_width: 8.0,
            line_height: 20.0,
            padding_x: 12.0,
            padding_y: 8.0,
            header_padding: 4.0,
            min_node_width: 100.0,
            min_node_height: 60.0,
        }
    }
}

impl TextMetrics {
    pub fn text_width(&self, text: &str) -> f64 {
        UnicodeWidthStr::width(text) as f64 * self.char_width
    }

    /// Box size of a node with a header `label` and `(name, type)` rows.
    pub fn node_size<'a>(
        &self,
        label: &str,
        columns: impl ExactSizeIterator<Item = (&'a str, &'a str)>,
    ) -> (f64, f64) {
        let rows = columns.len();
        let max_col_width = columns
            .map(|(name, typ)| self.text_width(name) + self.text_width(typ) + self.char_width * 2.0)
            .fold(0.0, f64::max);

        let content_width = self.text_width(label).max(max_col_width) + self.padding_x * 2.0;
        let width = content_width.max(self.min_node_width);

        let header_height = self.line_height + self.header_padding * 2.0;
        let body_height = if rows == 0 {
            0.0
        } else {
            rows as f64 * self.line_height + self.padding_y * 2.0
        };

        (width, (header_height + body_height).max(self.min_node_height))
    }

    /// Box size of a table showing every column.
    pub fn table_size(&self, table: &Table) -> (f64, f64) {
        self.node_size(
            &table.qualified_name,
            table.columns.iter().map(|c| (c.name.as_str(), c.typ.as_str())),
        )
    }
}
