use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::booking::{Booking, OwnerKind};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Capacity-constrained professional (e.g. a counselor).
    Resource,
    Client,
    OrgAdmin,
}

/// Caller context supplied by the identity layer. Trusted as-is.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
    pub org_id: Option<Uuid>,
    /// IANA zone used for display rendering and as the default input zone.
    pub timezone: String,
}

impl Actor {
    pub fn is_resource(&self) -> bool {
        matches!(self.role, Role::Resource)
    }

    /// Owner-or-resource scope check required before any mutation.
    pub fn owns(&self, booking: &Booking) -> bool {
        let owner = match booking.owner_kind {
            OwnerKind::Resource => booking.owner_id == self.id,
            OwnerKind::Organization => {
                self.role == Role::OrgAdmin && Some(booking.owner_id) == self.org_id
            }
        };
        owner || booking.resource_id == Some(self.id)
    }

    /// Owners and bound participants may read a booking.
    pub fn can_view(&self, booking: &Booking, participants: &[Uuid]) -> bool {
        self.owns(booking) || participants.contains(&self.id)
    }

    pub fn scope(&self) -> OwnerScope {
        OwnerScope {
            user_id: self.id,
            org_id: self.org_id,
        }
    }
}

/// Union of calendars visible to a user: their own resource calendar,
/// bookings they are bound to, and their organization's shared calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerScope {
    pub user_id: Uuid,
    pub org_id: Option<Uuid>,
}

impl OwnerScope {
    pub fn covers(&self, booking: &Booking, participants: &[Uuid]) -> bool {
        let owned = match booking.owner_kind {
            OwnerKind::Resource => booking.owner_id == self.user_id,
            OwnerKind::Organization => Some(booking.owner_id) == self.org_id,
        };
        owned || booking.resource_id == Some(self.user_id) || participants.contains(&self.user_id)
    }
}
