use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use fieldwright_core::handle::check_handle;
use fieldwright_core::validation::check_all;
use fieldwright_core::{CreatedItem, EntityKind, FailedItem, OperationLedger};

use crate::error::ItemError;
use crate::host::{ContentHost, HostEntity, LayoutField, NewEntryType, NewField, NewGroup, NewSection};
use crate::registry::TypeRegistry;
use crate::request::{Batch, EntryTypeRequest, FieldRequest, GroupRequest, MutationRequest, SectionRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Created(CreatedItem),
    Failed(ItemError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemResult {
    /// Position of the request in the submitted batch.
    pub index: usize,
    pub kind: EntityKind,
    pub name: String,
    pub handle: String,
    pub outcome: ItemOutcome,
}

impl ItemResult {
    pub fn is_created(&self) -> bool {
        matches!(self.outcome, ItemOutcome::Created(_))
    }

    pub fn error(&self) -> Option<&ItemError> {
        match &self.outcome {
            ItemOutcome::Failed(e) => Some(e),
            ItemOutcome::Created(_) => None,
        }
    }
}

/// Per-item results of one batch, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub results: Vec<ItemResult>,
}

impl BatchReport {
    pub fn created_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_created()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.len() - self.created_count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemResult> {
        self.results.iter().filter(|r| !r.is_created())
    }

    /// Created and failed items grouped per category, ready to record.
    pub fn ledger(&self) -> OperationLedger {
        let mut ledger = OperationLedger::default();
        for result in &self.results {
            match &result.outcome {
                ItemOutcome::Created(item) => ledger.push_created(result.kind, item.clone()),
                ItemOutcome::Failed(e) => ledger.push_failed(
                    result.kind,
                    FailedItem::new(&result.name, &result.handle, e.to_string()),
                ),
            }
        }
        ledger
    }
}

/// Dependencies flow fields -> entry types -> sections; groups stand alone.
fn execution_rank(kind: EntityKind) -> u8 {
    match kind {
        EntityKind::Field => 0,
        EntityKind::EntryType => 1,
        EntityKind::CategoryGroup => 2,
        EntityKind::TagGroup => 3,
        EntityKind::Section => 4,
    }
}

/// Applies batches against the host. Holds no state between calls.
pub struct OperationsExecutor<H> {
    host: Arc<H>,
    registry: Arc<TypeRegistry<H>>,
}

impl<H: ContentHost> OperationsExecutor<H> {
    pub fn new(host: Arc<H>, registry: Arc<TypeRegistry<H>>) -> Self {
        Self { host, registry }
    }

    pub fn execute(&self, batch: &Batch) -> BatchReport {
        let mut order: Vec<usize> = (0..batch.operations.len()).collect();
        order.sort_by_key(|&i| execution_rank(batch.operations[i].kind()));

        let mut created: HashMap<(EntityKind, String), u64> = HashMap::new();
        let mut results: Vec<Option<ItemResult>> = vec![None; batch.operations.len()];

        for index in order {
            let request = &batch.operations[index];
            let kind = request.kind();
            let outcome = match self.apply(request, &created) {
                Ok(entity) => {
                    info!(index, kind = kind.as_str(), handle = %entity.handle, id = entity.id, "created");
                    created.insert((kind, entity.handle.clone()), entity.id);
                    ItemOutcome::Created(entity.into())
                }
                Err(e) => {
                    warn!(index, kind = kind.as_str(), handle = %request.handle(), error = %e, "batch item failed");
                    ItemOutcome::Failed(e)
                }
            };
            results[index] = Some(ItemResult {
                index,
                kind,
                name: request.name().to_string(),
                handle: request.handle().to_string(),
                outcome,
            });
        }

        BatchReport {
            results: results.into_iter().flatten().collect(),
        }
    }

    fn apply(
        &self,
        request: &MutationRequest,
        created: &HashMap<(EntityKind, String), u64>,
    ) -> Result<HostEntity, ItemError> {
        match request {
            MutationRequest::Field(r) => self.create_field(r),
            MutationRequest::EntryType(r) => self.create_entry_type(r, created),
            MutationRequest::Section(r) => self.create_section(r, created),
            MutationRequest::CategoryGroup(r) => {
                check_handle_only(&r.handle)?;
                Ok(self.host.create_category_group(&new_group(r))?)
            }
            MutationRequest::TagGroup(r) => {
                check_handle_only(&r.handle)?;
                Ok(self.host.create_tag_group(&new_group(r))?)
            }
        }
    }

    fn create_field(&self, request: &FieldRequest) -> Result<HostEntity, ItemError> {
        let definition = self
            .registry
            .lookup(&request.field_type)
            .ok_or_else(|| ItemError::UnknownType(request.field_type.clone()))?;

        let mut violations = handle_violations(&request.handle);
        violations.extend(check_all(&definition.validation_rules(), &request.settings));
        if !violations.is_empty() {
            return Err(ItemError::Validation { violations });
        }

        Ok(self.host.create_field(&NewField {
            name: request.name.clone(),
            handle: request.handle.clone(),
            host_type_ref: definition.host_type_ref.clone(),
            settings: request.settings.clone(),
            instructions: request.instructions.clone(),
        })?)
    }

    fn create_entry_type(
        &self,
        request: &EntryTypeRequest,
        created: &HashMap<(EntityKind, String), u64>,
    ) -> Result<HostEntity, ItemError> {
        check_handle_only(&request.handle)?;

        let mut fields = Vec::with_capacity(request.fields.len());
        for assignment in &request.fields {
            match self.resolve(EntityKind::Field, &assignment.handle, created)? {
                Some(field_id) => fields.push(LayoutField {
                    field_id,
                    required: assignment.required,
                }),
                None => warn!(
                    entry_type = %request.handle,
                    field = %assignment.handle,
                    "field not found, leaving it out of the layout"
                ),
            }
        }

        Ok(self.host.create_entry_type(&NewEntryType {
            name: request.name.clone(),
            handle: request.handle.clone(),
            has_title_field: request.has_title_field,
            title_format: request.title_format.clone(),
            fields,
        })?)
    }

    fn create_section(
        &self,
        request: &SectionRequest,
        created: &HashMap<(EntityKind, String), u64>,
    ) -> Result<HostEntity, ItemError> {
        check_handle_only(&request.handle)?;

        let mut entry_type_ids = Vec::with_capacity(request.entry_types.len());
        for handle in &request.entry_types {
            match self.resolve(EntityKind::EntryType, handle, created)? {
                Some(id) => entry_type_ids.push(id),
                None => warn!(section = %request.handle, entry_type = %handle, "entry type not found"),
            }
        }
        if entry_type_ids.is_empty() {
            return Err(ItemError::MissingReference(format!(
                "section '{}' has no resolvable entry types (requested: {})",
                request.handle,
                request.entry_types.join(", ")
            )));
        }

        Ok(self.host.create_section(&NewSection {
            name: request.name.clone(),
            handle: request.handle.clone(),
            section_type: request.section_type,
            max_levels: request.max_levels,
            entry_type_ids,
        })?)
    }

    /// Entities created earlier in this batch win over pre-existing host entities.
    fn resolve(
        &self,
        kind: EntityKind,
        handle: &str,
        created: &HashMap<(EntityKind, String), u64>,
    ) -> Result<Option<u64>, ItemError> {
        if let Some(id) = created.get(&(kind, handle.to_string())) {
            return Ok(Some(*id));
        }
        Ok(self.host.find_entity(kind, handle)?.map(|entity| entity.id))
    }
}

fn handle_violations(handle: &str) -> Vec<String> {
    check_handle(handle).reason.into_iter().collect()
}

fn check_handle_only(handle: &str) -> Result<(), ItemError> {
    let violations = handle_violations(handle);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ItemError::Validation { violations })
    }
}

fn new_group(request: &GroupRequest) -> NewGroup {
    NewGroup {
        name: request.name.clone(),
        handle: request.handle.clone(),
        max_levels: request.max_levels,
    }
}
