use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

pub type Attributes = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
	Need,
	Resource,
}
impl ItemKind {
	pub fn table(self) -> &'static str {
		match self {
			Self::Need => "needs",
			Self::Resource => "resources",
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Need => "need",
			Self::Resource => "resource",
		}
	}

	/// Parses the plural collection name used in URLs, e.g. `needs`.
	pub fn from_plural(raw: &str) -> Option<Self> {
		match raw {
			"needs" => Some(Self::Need),
			"resources" => Some(Self::Resource),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
	pub id: String,
	pub kind: ItemKind,
	pub name: String,
	pub description: Option<String>,
	pub quantity: Option<f64>,
	pub owner: Option<String>,
	pub public: bool,
	pub attributes: Attributes,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
}
impl Item {
	pub fn is_owned_by(&self, requester: &str) -> bool {
		self.owner.as_deref() == Some(requester)
	}

	/// Public items, plus private items the requester owns.
	pub fn is_visible_to(&self, requester: Option<&str>) -> bool {
		self.public || requester.map(|requester| self.is_owned_by(requester)).unwrap_or(false)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
	pub name: String,
	pub description: Option<String>,
	pub quantity: Option<f64>,
	pub owner: Option<String>,
	#[serde(default)]
	pub public: bool,
	#[serde(default)]
	pub attributes: Attributes,
}
impl NewItem {
	pub fn validate(&self) -> Result<(), ItemRejection> {
		if self.name.trim().is_empty() {
			return Err(ItemRejection::MissingName);
		}
		if let Some(owner) = self.owner.as_deref()
			&& owner.trim().is_empty()
		{
			return Err(ItemRejection::BlankOwner);
		}

		validate_quantity(self.quantity)?;
		validate_attributes(&self.attributes)
	}
}

/// The fields an update may touch. `owner` is accepted only so that a mismatch can be reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemPatch {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub quantity: Option<f64>,
	#[serde(default)]
	pub public: Option<bool>,
	#[serde(default)]
	pub attributes: Option<Attributes>,
	#[serde(default)]
	pub owner: Option<String>,
}
impl ItemPatch {
	pub fn is_empty(&self) -> bool {
		self.name.is_none()
			&& self.description.is_none()
			&& self.quantity.is_none()
			&& self.public.is_none()
			&& self.attributes.is_none()
	}

	pub fn validate(&self) -> Result<(), ItemRejection> {
		if let Some(name) = self.name.as_deref()
			&& name.trim().is_empty()
		{
			return Err(ItemRejection::MissingName);
		}

		validate_quantity(self.quantity)?;

		if let Some(attributes) = self.attributes.as_ref() {
			validate_attributes(attributes)?;
		}

		Ok(())
	}

	/// Copies the mutable fields onto `item` and advances `updated_at`.
	pub fn apply(&self, item: &mut Item, now: OffsetDateTime) {
		if let Some(name) = self.name.as_ref() {
			item.name = name.trim().to_string();
		}
		if let Some(description) = self.description.as_ref() {
			item.description = Some(description.clone());
		}
		if let Some(quantity) = self.quantity {
			item.quantity = Some(quantity);
		}
		if let Some(public) = self.public {
			item.public = public;
		}
		if let Some(attributes) = self.attributes.as_ref() {
			item.attributes = attributes.clone();
		}

		item.updated_at = now.max(item.updated_at);
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemRejection {
	MissingName,
	BlankOwner,
	InvalidQuantity,
	InvalidAttribute { key: String },
}
impl ItemRejection {
	pub fn field(&self) -> String {
		match self {
			Self::MissingName => "$.name".to_string(),
			Self::BlankOwner => "$.owner".to_string(),
			Self::InvalidQuantity => "$.quantity".to_string(),
			Self::InvalidAttribute { key } => format!("$.attributes.{key}"),
		}
	}

	pub fn message(&self) -> &'static str {
		match self {
			Self::MissingName => "name is required.",
			Self::BlankOwner => "owner must not be blank.",
			Self::InvalidQuantity => "quantity must be a finite number greater than zero.",
			Self::InvalidAttribute { .. } => "attribute values must be strings or scalars.",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerViolation {
	/// The stored owner differs from the supplied one.
	Changed { stored: String },
	/// No owner was stored; owners can only be set at creation.
	Assigned,
}

/// Owner is write-once: a patch may repeat the stored owner but never change or add it.
pub fn check_owner(stored: Option<&str>, supplied: Option<&str>) -> Result<(), OwnerViolation> {
	let Some(supplied) = supplied else { return Ok(()) };

	match stored {
		Some(stored) if stored == supplied => Ok(()),
		Some(stored) => Err(OwnerViolation::Changed { stored: stored.to_string() }),
		None => Err(OwnerViolation::Assigned),
	}
}

fn validate_quantity(quantity: Option<f64>) -> Result<(), ItemRejection> {
	match quantity {
		Some(value) if !value.is_finite() || value <= 0.0 => Err(ItemRejection::InvalidQuantity),
		_ => Ok(()),
	}
}

fn validate_attributes(attributes: &Attributes) -> Result<(), ItemRejection> {
	for (key, value) in attributes {
		if matches!(value, Value::Array(_) | Value::Object(_)) {
			return Err(ItemRejection::InvalidAttribute { key: key.clone() });
		}
	}

	Ok(())
}
