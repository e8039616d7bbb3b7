//! Link resolution: turns by-name `links` declarations into associations.
//!
//! Resolution runs over a fully registered stage, so a link may point at a
//! service declared later in the same stage.

use crate::core::service::{Service, ServiceSummary};
use crate::utils::error::{Result, StackmateError};
use std::collections::HashSet;

/// One `DanglingLink` error per service whose links name undeclared siblings.
pub fn dangling_links<'a, I>(stage: &str, declarations: I) -> Vec<StackmateError>
where
    I: IntoIterator<Item = (&'a str, &'a [String])>,
{
    let declarations: Vec<(&str, &[String])> = declarations.into_iter().collect();
    let declared: HashSet<&str> = declarations.iter().map(|(name, _)| *name).collect();

    declarations
        .iter()
        .filter_map(|(name, links)| {
            let mut missing: Vec<String> = Vec::new();
            for link in links.iter() {
                if !declared.contains(link.as_str()) && !missing.contains(link) {
                    missing.push(link.clone());
                }
            }

            (!missing.is_empty()).then(|| StackmateError::DanglingLink {
                stage: stage.to_string(),
                service: name.to_string(),
                missing,
            })
        })
        .collect()
}

/// Checks every link of the stage, then runs each service's associations
/// against all of its siblings. Nothing is associated if any link dangles.
pub fn resolve(stage: &str, services: &mut [&mut Box<dyn Service>]) -> Result<()> {
    let errors = dangling_links(stage, services.iter().map(|s| (s.name(), s.links())));
    if !errors.is_empty() {
        return Err(StackmateError::Stage {
            stage: stage.to_string(),
            errors,
        });
    }

    let summaries: Vec<ServiceSummary> = services.iter().map(|s| s.summary()).collect();

    for (index, service) in services.iter_mut().enumerate() {
        for association in service.associations() {
            for (position, target) in summaries.iter().enumerate() {
                if position == index || !(association.lookup)(target) {
                    continue;
                }

                tracing::debug!("Associating '{}' with '{}'", summaries[index].name, target.name);
                (association.handler)(service.core_mut(), target);
            }
        }
    }

    Ok(())
}
