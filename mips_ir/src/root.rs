use crate::{GlobalData, Instruction, Label};
use std::fmt;

/// One element of the `.text` stream.
#[derive(Debug, Clone)]
pub enum TextItem {
    Label(Label),
    Instr(Instruction),
    /// A blank separator line between functions.
    Blank,
}

/// A complete assembly file: the `.data` section in definition order followed
/// by the `.text` stream.
#[derive(Debug, Default)]
pub struct Root {
    data: Vec<GlobalData>,
    text: Vec<TextItem>,
}

impl Root {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self) -> &[GlobalData] {
        &self.data
    }

    pub fn add_data(&mut self, data: GlobalData) {
        self.data.push(data);
    }

    pub fn add_label(&mut self, label: Label) {
        self.text.push(TextItem::Label(label));
    }

    pub fn add_instr(&mut self, instruction: Instruction) {
        self.text.push(TextItem::Instr(instruction));
    }

    pub fn add_blank(&mut self) {
        self.text.push(TextItem::Blank);
    }

    pub fn text(&self) -> &[TextItem] {
        &self.text
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, ".data")?;
        for data in &self.data {
            writeln!(f, "{data}")?;
        }
        writeln!(f)?;
        writeln!(f, ".text")?;
        for item in &self.text {
            match item {
                TextItem::Label(label) => writeln!(f, "{label}:")?,
                TextItem::Instr(instruction) => writeln!(f, "    {instruction}")?,
                TextItem::Blank => writeln!(f)?,
            }
        }
        Ok(())
    }
}
