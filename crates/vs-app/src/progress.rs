use vs_commands::{CommandName, CommandOutput};

/// Emitted once per applied command.
#[derive(Debug, Clone)]
pub struct GenerationEvent {
    pub index: usize,
    pub total: usize,
    pub name: CommandName,
    pub output: CommandOutput,
    pub elapsed_wall_s: f64,
}

/// Progress callback handed to the generator.
pub type GenerationListener<'a> = &'a mut dyn FnMut(GenerationEvent);
