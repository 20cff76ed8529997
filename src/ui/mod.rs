pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{banner, error, header, info, muted, prov_type, section, success, summary_row};
pub use table::{record_table, relation_table, stats_table, RecordRow, RelationRow, TableBuilder};
pub use theme::{theme, Theme};
