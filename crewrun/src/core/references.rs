//! Cross-task reference checks that need the whole task list.

use crate::core::placeholder;
use crate::core::router;
use crate::definition::WorkflowDefinition;
use crate::error::ParseError;

/// Reject `[[name]]` references to a file that only a later task produces.
///
/// A name also produced by an earlier task is fine: the earlier output is
/// what the reference sees.
pub fn check_forward_references(definition: &WorkflowDefinition) -> Result<(), ParseError> {
    let routed: Vec<String> = definition
        .tasks
        .iter()
        .map(|task| router::route(task).file_name)
        .collect();

    for (idx, task) in definition.tasks.iter().enumerate() {
        for name in placeholder::file_refs(&task.description_template) {
            let produced_earlier = routed[..idx].iter().any(|file| *file == name);
            if produced_earlier {
                continue;
            }
            if let Some(later) = routed[idx + 1..].iter().position(|file| *file == name) {
                let producer = &definition.tasks[idx + 1 + later];
                return Err(ParseError::reference(
                    task.line,
                    format!(
                        "task `{}` references `{name}` which is only produced later by `{}`",
                        task.name, producer.name
                    ),
                ));
            }
        }
    }
    Ok(())
}
