use crate::flow::LoginFlow;
use std::fmt::Debug;

/// Receives the normalized flow after a session, e.g. to build a prompt payload for a
/// downstream configuration generator.
pub trait FlowGenerator: Debug {
    fn generate(&self, flow: &LoginFlow) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

/// Renders the flow as the JSON document handed to generators as raw training data.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPayloadGenerator {
    pretty: bool,
}

impl JsonPayloadGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl FlowGenerator for JsonPayloadGenerator {
    fn generate(&self, flow: &LoginFlow) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let payload = if self.pretty {
            serde_json::to_string_pretty(flow)?
        } else {
            serde_json::to_string(flow)?
        };

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{Binding, FieldBinding, FlowStep, StepOrigin};

    #[test]
    fn json_payload_describes_steps_and_bindings() {
        let mut flow = LoginFlow::new();
        let mut step = FlowStep::new("https://x/login", "post", StepOrigin::Config);
        step.fields.push(FieldBinding::new("user", Binding::Username));
        flow.steps.push(step);

        let payload = JsonPayloadGenerator::new().generate(&flow).unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();

        assert_eq!(value["steps"][0]["method"], "POST");
        assert_eq!(value["steps"][0]["origin"], "config");
        assert_eq!(value["steps"][0]["fields"][0]["binding"]["kind"], "username");
        assert_eq!(value["complete"], true);
    }

    #[test]
    fn pretty_payload_spans_lines() {
        let payload = JsonPayloadGenerator::pretty()
            .generate(&LoginFlow::new())
            .unwrap();

        assert!(payload.contains('\n'));
    }
}
