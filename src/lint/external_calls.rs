use crate::assemble::AssembledFlow;

/// Every external call owns exactly one receiver participant and one message flow to it.
#[derive(Clone, Debug, Default)]
pub struct ExternalCallRule;

impl ExternalCallRule {
    pub fn check(flow: &AssembledFlow) -> Vec<String> {
        let mut errors = Vec::new();
        let calls = flow.external_calls().count();
        let receivers = flow.receivers().count();
        let message_flows = flow.receiver_message_flows().count();
        if calls != receivers || receivers != message_flows {
            errors.push(format!(
                "external_calls: {calls} external call(s), {receivers} receiver participant(s), {message_flows} receiver message flow(s)"
            ));
        }
        for (idx, call) in flow.external_calls().enumerate() {
            let owned = flow
                .receivers()
                .filter(|p| p.anchor.as_deref() == Some(call.id.as_str()))
                .count();
            let outgoing = flow
                .receiver_message_flows()
                .filter(|m| m.source == call.id)
                .count();
            if owned != 1 || outgoing != 1 {
                errors.push(format!(
                    "external_calls: call #{idx} ('{}') has {owned} receiver(s) and {outgoing} message flow(s)",
                    call.id
                ));
            }
        }
        for message_flow in &flow.message_flows {
            if flow.node(&message_flow.source).is_some() && flow.node(&message_flow.target).is_some()
            {
                errors.push(format!(
                    "external_calls: message flow '{}' connects two process nodes",
                    message_flow.id
                ));
            }
        }
        errors
    }
}
