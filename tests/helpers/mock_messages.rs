use serde_json::{json, Map, Value};

pub const DEFAULT_COMPANY_ID: &str = "company-test";

/// Builds queue payloads in the shape the campaign dispatcher publishes
pub struct MessageBuilder {
    fields: Map<String, Value>,
}

impl MessageBuilder {
    pub fn new(campaign_id: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("phone_number".to_string(), json!("+15550001111"));
        fields.insert("message".to_string(), json!("Your order has shipped"));
        fields.insert("campaign_id".to_string(), json!(campaign_id));
        fields.insert("company_id".to_string(), json!(DEFAULT_COMPANY_ID));
        fields.insert("is_last_message".to_string(), json!(false));
        Self { fields }
    }

    pub fn with_phone(mut self, phone_number: &str) -> Self {
        self.fields
            .insert("phone_number".to_string(), json!(phone_number));
        self
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.fields.insert("message".to_string(), json!(message));
        self
    }

    pub fn last(mut self) -> Self {
        self.fields
            .insert("is_last_message".to_string(), json!(true));
        self
    }

    pub fn without(mut self, field: &str) -> Self {
        self.fields.remove(field);
        self
    }

    pub fn build(self) -> Vec<u8> {
        serde_json::to_vec(&Value::Object(self.fields)).expect("payload serializes")
    }
}
