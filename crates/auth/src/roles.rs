use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use genera_core::{
    CommunityId, DomainError, GenerationId, NetworkId, RoleAssignmentId, SchoolId, UserId,
};

use crate::organization::{Generation, GrowthCommunity, School};

/// Role tag stored in `user_roles.role_type`.
///
/// The set is closed: rows carrying an unknown tag fail to decode at the data
/// access boundary instead of leaking into permission checks.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleType {
    /// Platform staff with full control (global admin).
    Admin,
    /// Consultant assigned to specific schools.
    Consultor,
    /// School-level leadership team.
    EquipoDirectivo,
    /// Leader of a Tractor/Innova generation.
    LiderGeneracion,
    /// Leader of a growth community.
    LiderComunidad,
    /// Supervisor of a network of schools (reporting only).
    SupervisorDeRed,
    /// Content/community manager.
    CommunityManager,
    /// Teacher / course participant.
    Docente,
}

impl RoleType {
    /// All roles, highest priority first.
    ///
    /// This ordering is what `get_highest_role` uses when a user holds several
    /// roles at once.
    pub const PRIORITY: [RoleType; 8] = [
        RoleType::Admin,
        RoleType::Consultor,
        RoleType::EquipoDirectivo,
        RoleType::LiderGeneracion,
        RoleType::LiderComunidad,
        RoleType::SupervisorDeRed,
        RoleType::CommunityManager,
        RoleType::Docente,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleType::Admin => "admin",
            RoleType::Consultor => "consultor",
            RoleType::EquipoDirectivo => "equipo_directivo",
            RoleType::LiderGeneracion => "lider_generacion",
            RoleType::LiderComunidad => "lider_comunidad",
            RoleType::SupervisorDeRed => "supervisor_de_red",
            RoleType::CommunityManager => "community_manager",
            RoleType::Docente => "docente",
        }
    }

    /// Position in [`RoleType::PRIORITY`] (0 is the highest).
    pub fn priority(&self) -> usize {
        Self::PRIORITY
            .iter()
            .position(|r| r == self)
            .unwrap_or(Self::PRIORITY.len())
    }

    /// Display name shown to end users.
    pub fn display_name(&self) -> &'static str {
        match self {
            RoleType::Admin => "Administrador Global",
            RoleType::Consultor => "Consultor FNE",
            RoleType::EquipoDirectivo => "Equipo Directivo",
            RoleType::LiderGeneracion => "Líder de Generación",
            RoleType::LiderComunidad => "Líder de Comunidad",
            RoleType::SupervisorDeRed => "Supervisor de Red",
            RoleType::CommunityManager => "Community Manager",
            RoleType::Docente => "Docente",
        }
    }

    /// Organizational scope a role assignment must carry.
    pub fn requirements(&self) -> RoleRequirements {
        match self {
            RoleType::Admin => RoleRequirements::none("Global role - no organizational scope required"),
            RoleType::SupervisorDeRed => {
                RoleRequirements::none("Network-level role - no specific school required")
            }
            RoleType::CommunityManager => {
                RoleRequirements::none("Content management role - no organizational scope required")
            }
            RoleType::Consultor | RoleType::EquipoDirectivo | RoleType::Docente => {
                RoleRequirements::school("Must be assigned to a specific school")
            }
            RoleType::LiderGeneracion => {
                RoleRequirements::school("Must be assigned to a specific school and generation")
            }
            RoleType::LiderComunidad => {
                RoleRequirements::school("Must be assigned to a school (community auto-created)")
            }
        }
    }
}

impl core::fmt::Display for RoleType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::PRIORITY
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| DomainError::UnknownRole(s.to_string()))
    }
}

/// Organizational requirements for assigning a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleRequirements {
    pub requires_school: bool,
    pub requires_generation: bool,
    pub requires_community: bool,
    pub description: &'static str,
}

impl RoleRequirements {
    const fn none(description: &'static str) -> Self {
        Self {
            requires_school: false,
            requires_generation: false,
            requires_community: false,
            description,
        }
    }

    const fn school(description: &'static str) -> Self {
        Self {
            requires_school: true,
            requires_generation: false,
            requires_community: false,
            description,
        }
    }
}

/// Organizational scope offered for a new role assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignmentScope {
    pub school_id: Option<SchoolId>,
    pub generation_id: Option<GenerationId>,
    pub community_id: Option<CommunityId>,
}

/// A single active (or revoked) role assignment.
///
/// Joined organizational records are present when the source query embedded
/// them; both the roles API and the direct query do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRole {
    pub id: RoleAssignmentId,
    pub user_id: UserId,
    pub role_type: RoleType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<SchoolId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<GenerationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community_id: Option<CommunityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub red_id: Option<NetworkId>,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school: Option<School>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<Generation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community: Option<GrowthCommunity>,
}

fn active_by_default() -> bool {
    true
}

impl UserRole {
    /// A bare active assignment with no organizational scope.
    pub fn new(user_id: UserId, role_type: RoleType) -> Self {
        Self {
            id: RoleAssignmentId::new(),
            user_id,
            role_type,
            school_id: None,
            generation_id: None,
            community_id: None,
            red_id: None,
            is_active: true,
            assigned_at: None,
            school: None,
            generation: None,
            community: None,
        }
    }

    pub fn with_school(mut self, school_id: SchoolId) -> Self {
        self.school_id = Some(school_id);
        self
    }

    pub fn with_generation(mut self, generation_id: GenerationId) -> Self {
        self.generation_id = Some(generation_id);
        self
    }

    pub fn with_community(mut self, community_id: CommunityId) -> Self {
        self.community_id = Some(community_id);
        self
    }

    pub fn with_network(mut self, red_id: NetworkId) -> Self {
        self.red_id = Some(red_id);
        self
    }
}

/// Value of the deprecated single-role `profiles.role` column.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyRole {
    Admin,
    Docente,
}

impl LegacyRole {
    /// Parse the legacy column; anything other than `admin`/`docente` is ignored.
    pub fn from_column(value: &str) -> Option<Self> {
        match value.trim() {
            "admin" => Some(LegacyRole::Admin),
            "docente" => Some(LegacyRole::Docente),
            _ => None,
        }
    }

    /// Role row the legacy value migrates to.
    pub fn target_role(&self) -> RoleType {
        match self {
            LegacyRole::Admin => RoleType::Admin,
            LegacyRole::Docente => RoleType::Docente,
        }
    }
}
