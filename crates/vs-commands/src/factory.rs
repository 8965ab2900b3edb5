//! DTO <-> command conversion.

use crate::command::{
    Command, CreateArea, CreateBindingConstraint, CreateCluster, CreateDistrict, CreateLink,
    CreateRenewablesCluster, CreateStStorage, RemoveArea, RemoveBindingConstraint, RemoveCluster,
    RemoveDistrict, RemoveLink, RemoveRenewablesCluster, RemoveStStorage, ReplaceMatrix,
    UpdateBindingConstraint, UpdateComments, UpdateConfig, UpdateDistrict, UpdateFile,
    UpdatePlaylist, UpdateScenarioBuilder,
};
use crate::common::CommandName;
use crate::context::CommandContext;
use crate::dto::{COMMAND_VERSION, CommandArgs, CommandDTO};
use crate::error::{CommandError, CommandResult};
use crate::utils::normalize_matrix_args;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

fn parse<T: DeserializeOwned>(name: CommandName, args: Map<String, Value>) -> CommandResult<T> {
    serde_json::from_value(Value::Object(args))
        .map_err(|e| CommandError::validation(format!("Invalid arguments for {}: {}", name, e)))
}

pub struct CommandFactory<'a> {
    ctx: &'a CommandContext,
}

impl<'a> CommandFactory<'a> {
    pub fn new(ctx: &'a CommandContext) -> Self {
        Self { ctx }
    }

    /// Build one typed command per argument bag of `dto`.
    pub fn to_command(&self, dto: &CommandDTO) -> CommandResult<Vec<Command>> {
        if dto.version > COMMAND_VERSION {
            return Err(CommandError::validation(format!(
                "Command {} has version {}, newer than supported version {}",
                dto.action, dto.version, COMMAND_VERSION
            )));
        }
        let name: CommandName = dto.action.parse().map_err(CommandError::Validation)?;
        dto.args
            .clone()
            .into_vec()
            .into_iter()
            .map(|args| self.build(name, args))
            .collect()
    }

    pub fn to_commands(&self, dtos: &[CommandDTO]) -> CommandResult<Vec<Command>> {
        let mut commands = Vec::new();
        for dto in dtos {
            commands.extend(self.to_command(dto)?);
        }
        Ok(commands)
    }

    /// Build and validate a single command from its argument bag.
    pub fn build(&self, name: CommandName, mut args: Map<String, Value>) -> CommandResult<Command> {
        normalize_matrix_args(name, &mut args, self.ctx)?;
        let mut command = match name {
            CommandName::CreateArea => Command::CreateArea(parse::<CreateArea>(name, args)?),
            CommandName::RemoveArea => Command::RemoveArea(parse::<RemoveArea>(name, args)?),
            CommandName::CreateDistrict => {
                Command::CreateDistrict(parse::<CreateDistrict>(name, args)?)
            }
            CommandName::RemoveDistrict => {
                Command::RemoveDistrict(parse::<RemoveDistrict>(name, args)?)
            }
            CommandName::UpdateDistrict => {
                Command::UpdateDistrict(parse::<UpdateDistrict>(name, args)?)
            }
            CommandName::CreateLink => Command::CreateLink(parse::<CreateLink>(name, args)?),
            CommandName::RemoveLink => Command::RemoveLink(parse::<RemoveLink>(name, args)?),
            CommandName::CreateCluster => {
                Command::CreateCluster(parse::<CreateCluster>(name, args)?)
            }
            CommandName::RemoveCluster => {
                Command::RemoveCluster(parse::<RemoveCluster>(name, args)?)
            }
            CommandName::CreateRenewablesCluster => {
                Command::CreateRenewablesCluster(parse::<CreateRenewablesCluster>(name, args)?)
            }
            CommandName::RemoveRenewablesCluster => {
                Command::RemoveRenewablesCluster(parse::<RemoveRenewablesCluster>(name, args)?)
            }
            CommandName::CreateStStorage => {
                Command::CreateStStorage(parse::<CreateStStorage>(name, args)?)
            }
            CommandName::RemoveStStorage => {
                Command::RemoveStStorage(parse::<RemoveStStorage>(name, args)?)
            }
            CommandName::CreateBindingConstraint => {
                Command::CreateBindingConstraint(parse::<CreateBindingConstraint>(name, args)?)
            }
            CommandName::UpdateBindingConstraint => {
                Command::UpdateBindingConstraint(parse::<UpdateBindingConstraint>(name, args)?)
            }
            CommandName::RemoveBindingConstraint => {
                Command::RemoveBindingConstraint(parse::<RemoveBindingConstraint>(name, args)?)
            }
            CommandName::ReplaceMatrix => {
                Command::ReplaceMatrix(parse::<ReplaceMatrix>(name, args)?)
            }
            CommandName::UpdateConfig => Command::UpdateConfig(parse::<UpdateConfig>(name, args)?),
            CommandName::UpdateComments => {
                Command::UpdateComments(parse::<UpdateComments>(name, args)?)
            }
            CommandName::UpdateFile => Command::UpdateFile(parse::<UpdateFile>(name, args)?),
            CommandName::UpdatePlaylist => {
                Command::UpdatePlaylist(parse::<UpdatePlaylist>(name, args)?)
            }
            CommandName::UpdateScenarioBuilder => {
                Command::UpdateScenarioBuilder(parse::<UpdateScenarioBuilder>(name, args)?)
            }
        };
        command.validate()?;
        command.fill_matrix_defaults(&self.ctx.constants);
        Ok(command)
    }

    /// Serialise commands, batching consecutive commands of the same action into one DTO.
    pub fn to_dtos(commands: &[Command]) -> CommandResult<Vec<CommandDTO>> {
        let mut dtos: Vec<CommandDTO> = Vec::new();
        for command in commands {
            let args = command.args()?;
            match dtos.last_mut() {
                Some(last) if last.action == command.name().as_str() => last.args.push(args),
                _ => dtos.push(CommandDTO::new(command.name(), CommandArgs::One(args))),
            }
        }
        Ok(dtos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> CommandContext {
        CommandContext::in_memory(24).unwrap().0
    }

    fn dto(value: Value) -> CommandDTO {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn unknown_action_and_future_version_are_rejected() {
        let ctx = ctx();
        let factory = CommandFactory::new(&ctx);
        let unknown = dto(json!({"action": "explode", "args": {}}));
        assert!(matches!(factory.to_command(&unknown), Err(CommandError::Validation(_))));

        let future = dto(json!({"action": "create_area", "args": {"area_name": "A"}, "version": 2}));
        assert!(matches!(factory.to_command(&future), Err(CommandError::Validation(_))));
    }

    #[test]
    fn missing_arguments_are_validation_errors() {
        let ctx = ctx();
        let factory = CommandFactory::new(&ctx);
        let bad = dto(json!({"action": "create_link", "args": {"area1": "a"}}));
        assert!(matches!(factory.to_command(&bad), Err(CommandError::Validation(_))));
    }

    #[test]
    fn inline_matrices_become_references() {
        let ctx = ctx();
        let factory = CommandFactory::new(&ctx);
        let commands = factory
            .to_command(&dto(json!({
                "action": "create_link",
                "args": {"area1": "a", "area2": "b", "series": [[0.0]]},
            })))
            .unwrap();
        let matrices = commands[0].get_inner_matrices();
        assert_eq!(matrices.len(), 1);
        assert!(ctx.matrix_service.exists(&matrices[0]).unwrap());
        assert_eq!(commands[0].args().unwrap()["series"], json!(matrices[0]));
    }

    #[test]
    fn omitted_matrices_default_to_constants() {
        let ctx = ctx();
        let factory = CommandFactory::new(&ctx);
        let commands = factory
            .to_command(&dto(json!({
                "action": "create_binding_constraint",
                "args": {"name": "bc", "time_step": "daily", "operator": "less", "coeffs": {}},
            })))
            .unwrap();
        assert_eq!(
            commands[0].get_inner_matrices(),
            vec![ctx.constants.binding_daily.clone()]
        );
    }

    #[test]
    fn batches_roundtrip_to_independent_commands() {
        let ctx = ctx();
        let factory = CommandFactory::new(&ctx);
        let commands = vec![
            Command::CreateArea(CreateArea::new("A")),
            Command::CreateArea(CreateArea::new("B")),
            Command::UpdateConfig(UpdateConfig {
                target: "settings/generaldata/general/nbyears".into(),
                data: json!(2),
            }),
            Command::CreateArea(CreateArea::new("C")),
        ];
        let dtos = CommandFactory::to_dtos(&commands).unwrap();
        assert_eq!(dtos.len(), 3);
        assert_eq!(dtos[0].args.len(), 2);

        let back = factory.to_commands(&dtos).unwrap();
        assert_eq!(back, commands);
    }
}
