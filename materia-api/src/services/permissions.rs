//! Capability checks shared by every write path

use materia_common::db::{Material, Role};

/// Identity of the user behind a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: String,
    pub role: Role,
}

impl Caller {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Administrator
    }
}

/// Whether the caller may author new materials
pub fn can_author(caller: &Caller) -> bool {
    caller.role.can_author()
}

/// Whether the caller may update a material: its creator or any administrator
pub fn can_edit(caller: &Caller, material: &Material) -> bool {
    caller.is_admin() || caller.id == material.creator_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use materia_common::db::{ModerationState, UserSummary};
    use uuid::Uuid;

    fn material(creator: &str) -> Material {
        let now = materia_common::time::now();
        Material {
            id: Uuid::new_v4(),
            name: "Foam A".to_string(),
            description: None,
            tools: Vec::new(),
            composition: Vec::new(),
            mechanical_properties: Vec::new(),
            perceptual_properties: Vec::new(),
            emotional_properties: Vec::new(),
            derived_from: None,
            creator_id: creator.to_string(),
            creator: None,
            moderation_state: ModerationState::Pending,
            collaborators: vec![UserSummary {
                id: "helper".to_string(),
                display_name: "Helper".to_string(),
                email: "helper@x.com".to_string(),
            }],
            gallery: Vec::new(),
            steps: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_creator_and_admin_can_edit() {
        let m = material("ana");
        assert!(can_edit(&Caller::new("ana", Role::Collaborator), &m));
        assert!(can_edit(&Caller::new("root", Role::Administrator), &m));
    }

    #[test]
    fn test_others_cannot_edit() {
        let m = material("ana");
        assert!(!can_edit(&Caller::new("bob", Role::Collaborator), &m));
        assert!(!can_edit(&Caller::new("helper", Role::Collaborator), &m));
        assert!(!can_edit(&Caller::new("carl", Role::Reader), &m));
    }

    #[test]
    fn test_readers_cannot_author() {
        assert!(!can_author(&Caller::new("carl", Role::Reader)));
        assert!(can_author(&Caller::new("ana", Role::Collaborator)));
    }
}
