use serde::{Deserialize, Serialize};

/// Lifecycle stage of an order.
///
/// The wire form is the lowercase snake_case name, except `entered-in-error`
/// which keeps its hyphenated spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "draft")]
    Draft,
    #[serde(rename = "therapy_requested")]
    TherapyRequested,
    #[serde(rename = "therapy_confirmed")]
    TherapyConfirmed,
    #[serde(rename = "material_ready_for_pickup")]
    MaterialReadyForPickup,
    #[serde(rename = "shipped_to_manufacturer")]
    ShippedToManufacturer,
    #[serde(rename = "delivered_to_manufacturer")]
    DeliveredToManufacturer,
    #[serde(rename = "processing_started")]
    ProcessingStarted,
    #[serde(rename = "ready_for_dispatch")]
    ReadyForDispatch,
    #[serde(rename = "shipped_to_hospital")]
    ShippedToHospital,
    #[serde(rename = "delivered_to_hospital")]
    DeliveredToHospital,
    #[serde(rename = "therapy_cancelled")]
    TherapyCancelled,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "entered-in-error")]
    EnteredInError,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 13] = [
        OrderStatus::Draft,
        OrderStatus::TherapyRequested,
        OrderStatus::TherapyConfirmed,
        OrderStatus::MaterialReadyForPickup,
        OrderStatus::ShippedToManufacturer,
        OrderStatus::DeliveredToManufacturer,
        OrderStatus::ProcessingStarted,
        OrderStatus::ReadyForDispatch,
        OrderStatus::ShippedToHospital,
        OrderStatus::DeliveredToHospital,
        OrderStatus::TherapyCancelled,
        OrderStatus::Completed,
        OrderStatus::EnteredInError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::TherapyRequested => "therapy_requested",
            OrderStatus::TherapyConfirmed => "therapy_confirmed",
            OrderStatus::MaterialReadyForPickup => "material_ready_for_pickup",
            OrderStatus::ShippedToManufacturer => "shipped_to_manufacturer",
            OrderStatus::DeliveredToManufacturer => "delivered_to_manufacturer",
            OrderStatus::ProcessingStarted => "processing_started",
            OrderStatus::ReadyForDispatch => "ready_for_dispatch",
            OrderStatus::ShippedToHospital => "shipped_to_hospital",
            OrderStatus::DeliveredToHospital => "delivered_to_hospital",
            OrderStatus::TherapyCancelled => "therapy_cancelled",
            OrderStatus::Completed => "completed",
            OrderStatus::EnteredInError => "entered-in-error",
        }
    }

    /// Exact (case-sensitive) lookup by wire name.
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Comma-separated list of every valid wire name, for error messages.
    pub fn valid_values() -> String {
        Self::ALL
            .iter()
            .map(|status| status.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Returns true if no further transition is allowed out of this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::TherapyCancelled | OrderStatus::EnteredInError
        )
    }

    /// The next step on the normal fulfillment path, if any.
    fn next_on_path(&self) -> Option<Self> {
        match self {
            OrderStatus::Draft => Some(OrderStatus::TherapyRequested),
            OrderStatus::TherapyRequested => Some(OrderStatus::TherapyConfirmed),
            OrderStatus::TherapyConfirmed => Some(OrderStatus::MaterialReadyForPickup),
            OrderStatus::MaterialReadyForPickup => Some(OrderStatus::ShippedToManufacturer),
            OrderStatus::ShippedToManufacturer => Some(OrderStatus::DeliveredToManufacturer),
            OrderStatus::DeliveredToManufacturer => Some(OrderStatus::ProcessingStarted),
            OrderStatus::ProcessingStarted => Some(OrderStatus::ReadyForDispatch),
            OrderStatus::ReadyForDispatch => Some(OrderStatus::ShippedToHospital),
            OrderStatus::ShippedToHospital => Some(OrderStatus::DeliveredToHospital),
            OrderStatus::DeliveredToHospital => Some(OrderStatus::Completed),
            OrderStatus::TherapyCancelled
            | OrderStatus::Completed
            | OrderStatus::EnteredInError => None,
        }
    }

    /// Statuses reachable in one step from this one.
    ///
    /// Any non-terminal status may advance along the fulfillment path, be cancelled,
    /// or be marked as entered in error. Terminal statuses have no successors.
    pub fn allowed_next(&self) -> Vec<OrderStatus> {
        if self.is_terminal() {
            return Vec::new();
        }

        let mut next: Vec<OrderStatus> = self.next_on_path().into_iter().collect();
        for escape in [OrderStatus::TherapyCancelled, OrderStatus::EnteredInError] {
            if !next.contains(&escape) {
                next.push(escape);
            }
        }
        next
    }

    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        self.allowed_next().contains(&to)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
