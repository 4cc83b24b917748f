use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::OrderStatus;

pub type OrderId = String;

/// Caller-supplied fields that are not part of the canonical shape.
/// They are carried through verbatim.
pub type ExtraFields = Map<String, Value>;

/// One entry in an order's append-only status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub status: OrderStatus,
    #[serde(default)]
    pub updated_by: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl StatusEvent {
    pub fn new(status: OrderStatus, updated_by: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            status,
            updated_by: updated_by.into(),
            timestamp: timestamp.into(),
            extra: ExtraFields::new(),
        }
    }

    pub fn with_extra(mut self, extra: ExtraFields) -> Self {
        self.extra = extra;
        self
    }

    /// Build the history entry for a status update.
    /// The whole update payload is kept, including `orderId` and any extra fields.
    pub fn from_update(update: OrderStatusUpdate, status: OrderStatus) -> Self {
        let mut extra = update.extra;
        extra.insert("orderId".to_string(), Value::String(update.order_id));
        Self::new(status, update.updated_by, update.timestamp).with_extra(extra)
    }
}

/// Top-level keys owned by the typed fields of [`Order`].
/// Caller extras may never shadow them.
const ORDER_FIELDS: [&str; 11] = [
    "orderId",
    "therapyType",
    "manufacturerId",
    "hospitalId",
    "logisticsId",
    "slotId",
    "currentStatus",
    "statusHistory",
    "createdAt",
    "ccnCode",
    "cmsCertNumber",
];

/// The canonical persisted order record, stored as JSON under its `orderId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: OrderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub therapy_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hospital_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logistics_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_id: Option<String>,
    pub current_status: OrderStatus,
    pub status_history: Vec<StatusEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ccn_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cms_cert_number: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Order {
    /// Build a new order from a creation request whose status has already been validated.
    /// The history is seeded with a single event attributed to `createdBy`.
    ///
    /// The record is the caller's payload merged with the canonical fields: the request's
    /// `status`, `createdBy` and `statusTimestamp` stay on it, and any caller value under a
    /// canonical key is replaced.
    pub fn from_request(request: OrderCreateRequest, status: OrderStatus) -> Self {
        let mut extra = request.extra;
        extra.retain(|key, _| !ORDER_FIELDS.contains(&key.as_str()));
        extra.insert("status".to_string(), Value::String(request.status));
        extra.insert(
            "createdBy".to_string(),
            Value::String(request.created_by.clone()),
        );
        extra.insert(
            "statusTimestamp".to_string(),
            Value::String(request.status_timestamp.clone()),
        );

        let initial = StatusEvent::new(status, request.created_by, request.status_timestamp);

        Self {
            order_id: request.order_id,
            therapy_type: request.therapy_type,
            manufacturer_id: request.manufacturer_id,
            hospital_id: request.hospital_id,
            logistics_id: request.logistics_id,
            slot_id: request.slot_id,
            current_status: status,
            status_history: vec![initial],
            created_at: request.created_at,
            ccn_code: request.ccn_code,
            cms_cert_number: request.cms_cert_number,
            extra,
        }
    }

    /// Append an event and make its status current.
    pub fn record_status(&mut self, event: StatusEvent) {
        self.current_status = event.status;
        self.status_history.push(event);
    }

    pub fn last_event(&self) -> Option<&StatusEvent> {
        self.status_history.last()
    }

    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// Payload accepted by order creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreateRequest {
    pub order_id: OrderId,
    /// Initial status, validated against [`OrderStatus`] by the service.
    pub status: String,
    pub created_by: String,
    pub status_timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub therapy_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hospital_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logistics_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ccn_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cms_cert_number: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl OrderCreateRequest {
    pub fn new(
        order_id: impl Into<String>,
        status: OrderStatus,
        created_by: impl Into<String>,
        status_timestamp: impl Into<String>,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            status: status.as_str().to_string(),
            created_by: created_by.into(),
            status_timestamp: status_timestamp.into(),
            therapy_type: None,
            manufacturer_id: None,
            hospital_id: None,
            logistics_id: None,
            slot_id: None,
            created_at: None,
            ccn_code: None,
            cms_cert_number: None,
            extra: ExtraFields::new(),
        }
    }

    pub fn with_therapy_type(mut self, therapy_type: impl Into<String>) -> Self {
        self.therapy_type = Some(therapy_type.into());
        self
    }

    pub fn with_parties(
        mut self,
        manufacturer_id: impl Into<String>,
        hospital_id: impl Into<String>,
        logistics_id: impl Into<String>,
    ) -> Self {
        self.manufacturer_id = Some(manufacturer_id.into());
        self.hospital_id = Some(hospital_id.into());
        self.logistics_id = Some(logistics_id.into());
        self
    }

    pub fn with_slot_id(mut self, slot_id: impl Into<String>) -> Self {
        self.slot_id = Some(slot_id.into());
        self
    }

    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }

    pub fn with_certification(
        mut self,
        ccn_code: impl Into<String>,
        cms_cert_number: impl Into<String>,
    ) -> Self {
        self.ccn_code = Some(ccn_code.into());
        self.cms_cert_number = Some(cms_cert_number.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Payload accepted by a status update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusUpdate {
    pub order_id: OrderId,
    /// Target status, validated against [`OrderStatus`] by the service.
    pub status: String,
    pub updated_by: String,
    pub timestamp: String,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl OrderStatusUpdate {
    pub fn new(
        order_id: impl Into<String>,
        status: impl Into<String>,
        updated_by: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            status: status.into(),
            updated_by: updated_by.into(),
            timestamp: timestamp.into(),
            extra: ExtraFields::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}
