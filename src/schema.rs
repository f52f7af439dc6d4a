//! Schema vocabulary shared by the provider block, resources and data sources.
//!
//! Resource modules describe their arguments with the builders here. The
//! resulting [`Schema`] is consumed three ways: [`crate::validation`] checks
//! configuration against it, [`crate::plan`] diffs prior and proposed state
//! with it, and the server converts it into the `GetSchema` response.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Value type of an attribute.
///
/// Serialized as JSON into the `type` field of the wire attribute, e.g.
/// `"string"` or `{"list":"string"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// UTF-8 string.
    String,
    /// Signed 64-bit integer.
    Int64,
    /// Double precision number. Veeam payloads never need it, but hosts
    /// may send it.
    Float64,
    /// Boolean.
    Bool,
    /// Homogeneous ordered list.
    List(Box<AttributeType>),
    /// Object with fixed attribute names, used for computed list elements.
    Object(HashMap<String, AttributeType>),
}

impl AttributeType {
    /// `list(element)`.
    pub fn list(element: AttributeType) -> Self {
        Self::List(Box::new(element))
    }

    /// `object({name: type, ..})`.
    pub fn object(attributes: HashMap<String, AttributeType>) -> Self {
        Self::Object(attributes)
    }
}

/// Who may set an attribute and whether its value is secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttributeFlags {
    /// Must be present in configuration.
    pub required: bool,
    /// May be present in configuration.
    pub optional: bool,
    /// Filled in from the Veeam server response.
    pub computed: bool,
    /// Redacted by the host in plan output.
    pub sensitive: bool,
}

impl AttributeFlags {
    const NONE: Self = Self {
        required: false,
        optional: false,
        computed: false,
        sensitive: false,
    };

    /// Set by the user, always.
    pub const fn required() -> Self {
        Self {
            required: true,
            ..Self::NONE
        }
    }

    /// Set by the user, or left null.
    pub const fn optional() -> Self {
        Self {
            optional: true,
            ..Self::NONE
        }
    }

    /// Set by the server only.
    pub const fn computed() -> Self {
        Self {
            computed: true,
            ..Self::NONE
        }
    }

    /// Set by the user, or by the server when the user leaves it out.
    pub const fn optional_computed() -> Self {
        Self {
            optional: true,
            computed: true,
            ..Self::NONE
        }
    }

    /// Same flags, marked sensitive.
    pub const fn sensitive(self) -> Self {
        Self {
            sensitive: true,
            ..self
        }
    }
}

/// One named value in a block.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Value type.
    pub attr_type: AttributeType,
    /// Usage flags.
    pub flags: AttributeFlags,
    /// Documentation shown by the host.
    pub description: Option<String>,
    /// A change to this attribute replaces the Veeam object instead of
    /// updating it.
    pub force_new: bool,
    /// Value planned when configuration leaves the attribute null.
    pub default: Option<serde_json::Value>,
}

impl Attribute {
    /// Attribute with the given type and flags and nothing else.
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            default: None,
        }
    }

    /// `string`, required.
    pub fn required_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::required())
    }

    /// `string`, optional.
    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional())
    }

    /// `string`, computed.
    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::computed())
    }

    /// `string`, optional and computed.
    pub fn optional_computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional_computed())
    }

    /// `int64`, required.
    pub fn required_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::required())
    }

    /// `int64`, optional.
    pub fn optional_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::optional())
    }

    /// `int64`, computed.
    pub fn computed_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::computed())
    }

    /// `int64`, optional and computed.
    pub fn optional_computed_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::optional_computed())
    }

    /// `bool`, optional.
    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::optional())
    }

    /// `list(string)`, required.
    pub fn required_string_list() -> Self {
        Self::new(AttributeType::list(AttributeType::String), AttributeFlags::required())
    }

    /// Server-filled list, e.g. the rows of a list data source.
    pub fn computed_list(element: AttributeType) -> Self {
        Self::new(AttributeType::list(element), AttributeFlags::computed())
    }

    /// True when configuration can never set this attribute.
    pub fn is_computed_only(&self) -> bool {
        let AttributeFlags {
            required,
            optional,
            computed,
            ..
        } = self.flags;
        computed && !optional && !required
    }

    /// Attach documentation.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the object when this attribute changes.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Planned value when configuration leaves this null.
    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Mark as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.flags = self.flags.sensitive();
        self
    }
}

/// How many instances of a nested block may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockNestingMode {
    /// Zero or one, encoded as a JSON object.
    #[default]
    Single,
    /// Any number, encoded as a JSON array in order.
    List,
}

/// A group of attributes and nested blocks.
///
/// Veeam request bodies nest their settings (`share`, `mountServer`,
/// `processing`, ...), and each of those becomes a block here.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    /// Attributes by snake_case name.
    pub attributes: HashMap<String, Attribute>,
    /// Nested blocks by snake_case name.
    pub blocks: HashMap<String, NestedBlock>,
    /// Documentation shown by the host.
    pub description: Option<String>,
}

impl Block {
    /// Empty value.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Add a nested block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    /// Attach documentation.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A [`Block`] placed inside another block.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedBlock {
    /// Contents of each instance.
    pub block: Block,
    /// Single or list.
    pub nesting_mode: BlockNestingMode,
    /// Fewest instances configuration may give.
    pub min_items: u32,
    /// Most instances configuration may give; 0 means unbounded.
    pub max_items: u32,
}

impl NestedBlock {
    fn with_mode(block: Block, nesting_mode: BlockNestingMode, max_items: u32) -> Self {
        Self {
            block,
            nesting_mode,
            min_items: 0,
            max_items,
        }
    }

    /// Zero or one instance.
    pub fn single(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Single, 1)
    }

    /// Unbounded list of instances.
    pub fn list(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::List, 0)
    }

    /// Require at least `min` instances.
    pub fn with_min_items(mut self, min: u32) -> Self {
        self.min_items = min;
        self
    }

    /// Allow at most `max` instances.
    pub fn with_max_items(mut self, max: u32) -> Self {
        self.max_items = max;
        self
    }
}

/// Root schema of one resource type, data source type, or the provider block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    /// State layout version. Every Veeam type is still at 0.
    pub version: u64,
    /// Top-level attributes and blocks.
    pub block: Block,
}

impl Schema {
    /// Empty schema at `version`.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            block: Block::new(),
        }
    }

    /// Version 0 schema.
    pub fn v0() -> Self {
        Self::new(0)
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block = self.block.with_attribute(name, attr);
        self
    }

    /// Add a nested block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.block = self.block.with_block(name, block);
        self
    }

    /// Attach documentation.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.block = self.block.with_description(description);
        self
    }
}

/// Everything the provider serves in `GetSchema`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProviderSchema {
    /// The `provider "veeam" { .. }` block.
    pub provider: Schema,
    /// Resource schemas by type name.
    pub resources: HashMap<String, Schema>,
    /// Data source schemas by type name.
    pub data_sources: HashMap<String, Schema>,
}

impl ProviderSchema {
    /// Empty value.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider block schema.
    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    /// Register a resource type.
    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }

    /// Register a data source type.
    pub fn with_data_source(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.data_sources.insert(name.into(), schema);
        self
    }
}

/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    /// The operation failed.
    Error,
    /// The operation went ahead, but something needs attention.
    Warning,
}

/// A message returned to the host alongside, or instead of, a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Error or warning.
    pub severity: DiagnosticSeverity,
    /// One-line summary.
    pub summary: String,
    /// Longer explanation, often the Veeam error message.
    pub detail: Option<String>,
    /// Dotted attribute path, e.g. `share.credentials_id`.
    pub attribute: Option<String>,
}

impl Diagnostic {
    fn new(severity: DiagnosticSeverity, summary: impl Into<String>) -> Self {
        Self {
            severity,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Error, summary)
    }

    /// Warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Warning, summary)
    }

    /// Attach a longer explanation.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Point the diagnostic at an attribute path.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_type_wire_encoding() {
        assert_eq!(serde_json::to_value(AttributeType::String).unwrap(), json!("string"));
        assert_eq!(
            serde_json::to_value(AttributeType::list(AttributeType::Int64)).unwrap(),
            json!({"list": "int64"})
        );

        let row = AttributeType::object(HashMap::from([(
            "region_id".to_string(),
            AttributeType::String,
        )]));
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!({"object": {"region_id": "string"}})
        );
    }

    #[test]
    fn test_password_flags() {
        let password = Attribute::optional_string().sensitive();
        assert!(password.flags.optional);
        assert!(password.flags.sensitive);
        assert!(!password.flags.required);

        let both = AttributeFlags::optional_computed();
        assert!(both.optional && both.computed && !both.required);
    }

    #[test]
    fn test_storage_account_attribute() {
        let attr = Attribute::required_string()
            .with_description("Azure storage account ID")
            .with_force_new();
        assert_eq!(attr.attr_type, AttributeType::String);
        assert!(attr.flags.required);
        assert!(attr.force_new);
        assert_eq!(attr.description.as_deref(), Some("Azure storage account ID"));

        let tier = Attribute::optional_string().with_default(json!("Inferred"));
        assert_eq!(tier.default, Some(json!("Inferred")));
    }

    #[test]
    fn test_computed_only() {
        assert!(Attribute::computed_string().is_computed_only());
        assert!(Attribute::computed_list(AttributeType::String).is_computed_only());
        assert!(!Attribute::optional_computed_string().is_computed_only());
        assert!(!Attribute::required_string().is_computed_only());
    }

    #[test]
    fn test_repository_schema() {
        let schema = Schema::v0()
            .with_description("VBR backup repository")
            .with_attribute("name", Attribute::required_string())
            .with_attribute("id", Attribute::computed_string())
            .with_block(
                "mount_server",
                NestedBlock::single(
                    Block::new().with_attribute("v_power_nfs_enabled", Attribute::optional_bool()),
                )
                .with_min_items(1),
            );

        assert_eq!(schema.version, 0);
        assert_eq!(schema.block.attributes.len(), 2);
        assert_eq!(schema.block.blocks["mount_server"].min_items, 1);
        assert_eq!(schema.block.blocks["mount_server"].max_items, 1);
        assert_eq!(schema.block.description.as_deref(), Some("VBR backup repository"));

        let regions = NestedBlock::list(Block::new()).with_max_items(5);
        assert_eq!(regions.nesting_mode, BlockNestingMode::List);
        assert_eq!(regions.max_items, 5);
    }

    #[test]
    fn test_provider_schema() {
        let schema = ProviderSchema::new()
            .with_provider_config(
                Schema::v0().with_attribute("password", Attribute::optional_string().sensitive()),
            )
            .with_resource("veeam_azure_repository", Schema::v0())
            .with_data_source("veeam_azure_subscriptions", Schema::v0());

        assert!(schema.provider.block.attributes["password"].flags.sensitive);
        assert!(schema.resources.contains_key("veeam_azure_repository"));
        assert!(schema.data_sources.contains_key("veeam_azure_subscriptions"));
    }

    #[test]
    fn test_diagnostic() {
        let diag = Diagnostic::error("Missing credentials")
            .with_detail("share.credentials_id is required for Smb repositories")
            .with_attribute("share.credentials_id");
        assert_eq!(diag.severity, DiagnosticSeverity::Error);
        assert_eq!(diag.attribute.as_deref(), Some("share.credentials_id"));

        assert_eq!(Diagnostic::warning("x").severity, DiagnosticSeverity::Warning);
    }
}
