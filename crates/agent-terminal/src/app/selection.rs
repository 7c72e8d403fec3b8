//! Agent selection dialog.
//!
//! The dialog lists a fixed set of presets. Some presets need extra input
//! (a custom model name, a reference voice clip); those fields appear below
//! the list and are cycled with Tab.

use agent_terminal_core::paths::expand_tilde;
use agent_terminal_core::{BackendKind, ConnectorSpec};

/// One entry in the selection list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub label: &'static str,
    pub kind: BackendKind,
    /// Fixed model, or `None` when the user types it.
    pub model: Option<&'static str>,
}

impl Preset {
    pub fn needs_model_input(&self) -> bool {
        self.model.is_none()
    }

    pub fn needs_audio_input(&self) -> bool {
        self.kind.needs_audio()
    }
}

pub static PRESETS: [Preset; 5] = [
    Preset {
        label: "OpenAI: GPT-4o",
        kind: BackendKind::OpenAi,
        model: Some("gpt-4o"),
    },
    Preset {
        label: "OpenAI: GPT-3.5 Turbo",
        kind: BackendKind::OpenAi,
        model: Some("gpt-3.5-turbo"),
    },
    Preset {
        label: "Ollama: Llama 3",
        kind: BackendKind::Ollama,
        model: Some("llama3"),
    },
    Preset {
        label: "Ollama: Custom",
        kind: BackendKind::Ollama,
        model: None,
    },
    Preset {
        label: "Voice Cloning (GPT-4o)",
        kind: BackendKind::Voice,
        model: Some("gpt-4o"),
    },
];

/// Which part of the dialog receives typed characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    List,
    Model,
    Audio,
}

/// Why the dialog cannot produce a spec yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Incomplete {
    Model,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionDialog {
    pub selected: usize,
    pub field: Field,
    pub model_input: String,
    pub audio_input: String,
}

impl Default for SelectionDialog {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionDialog {
    pub fn new() -> Self {
        Self {
            selected: 0,
            field: Field::List,
            model_input: String::new(),
            audio_input: String::new(),
        }
    }

    pub fn preset(&self) -> &'static Preset {
        &PRESETS[self.selected.min(PRESETS.len() - 1)]
    }

    pub fn select_next(&mut self) {
        self.selected = (self.selected + 1) % PRESETS.len();
        self.field = Field::List;
    }

    pub fn select_previous(&mut self) {
        self.selected = (self.selected + PRESETS.len() - 1) % PRESETS.len();
        self.field = Field::List;
    }

    /// Fields reachable with Tab for the current preset.
    pub fn fields(&self) -> Vec<Field> {
        let preset = self.preset();
        let mut fields = vec![Field::List];
        if preset.needs_model_input() {
            fields.push(Field::Model);
        }
        if preset.needs_audio_input() {
            fields.push(Field::Audio);
        }
        fields
    }

    pub fn next_field(&mut self) {
        let fields = self.fields();
        let current = fields.iter().position(|f| *f == self.field).unwrap_or(0);
        self.field = fields[(current + 1) % fields.len()];
    }

    /// Type a character into the focused text field. Ignored on the list.
    pub fn push_char(&mut self, c: char) {
        match self.field {
            Field::List => {}
            Field::Model => self.model_input.push(c),
            Field::Audio => self.audio_input.push(c),
        }
    }

    pub fn backspace(&mut self) {
        match self.field {
            Field::List => {}
            Field::Model => {
                self.model_input.pop();
            }
            Field::Audio => {
                self.audio_input.pop();
            }
        }
    }

    /// Build the connector spec, or report the first missing input.
    ///
    /// On failure the focus moves to the missing field.
    pub fn build_spec(&mut self) -> Result<ConnectorSpec, Incomplete> {
        let preset = self.preset();

        let model = match preset.model {
            Some(model) => model.to_string(),
            None => {
                let typed = self.model_input.trim();
                if typed.is_empty() {
                    self.field = Field::Model;
                    return Err(Incomplete::Model);
                }
                typed.to_string()
            }
        };

        let mut spec = ConnectorSpec::new(preset.kind, model);
        if preset.needs_audio_input() {
            let typed = self.audio_input.trim();
            if typed.is_empty() {
                self.field = Field::Audio;
                return Err(Incomplete::Audio);
            }
            spec = spec.audio_path(expand_tilde(typed));
        }
        Ok(spec)
    }
}
