use pdp_engine::{Dialect, Evaluator, EvaluatorMode, Result};

fn main() -> Result<()> {
    let policy = r#"{
        "schemaVersion": "2023-06-01",
        "policyId": "job-submission",
        "combiningAlg": "Deny-Overrides",
        "rules": [
            {
                "ruleId": "atlas-submits",
                "effect": "Permit",
                "subjects": [[
                    { "attributeId": "vo", "value": "atlas" },
                    {
                        "attributeId": "subject-id",
                        "type": "x500Name",
                        "value": "/O=Grid/OU=atlas",
                        "function": "match"
                    }
                ]],
                "actions": [[{ "attributeId": "action-id", "value": "submit" }]],
                "obligations": [
                    {
                        "obligationId": "account-mapping",
                        "fulfillOn": "Permit",
                        "assignments": [{ "attributeId": "local-identity", "value": "atlas001" }]
                    }
                ]
            }
        ]
    }"#;

    // Load policies once.
    let evaluator = Evaluator::builder(Dialect::Compact)
        .with_mode(EvaluatorMode::StopsOnPermit)
        .with_policy(policy, Some("demos/job-submission.json".into()))
        .build()?;

    // Evaluate as many requests as needed.
    let request = r#"{
        "requestItems": [
            {
                "subjects": [[
                    { "attributeId": "vo", "value": "atlas" },
                    {
                        "attributeId": "subject-id",
                        "type": "x500Name",
                        "value": "/O=Grid/OU=atlas/CN=Alice"
                    }
                ]],
                "actions": [
                    { "attributeId": "action-id", "value": "submit" },
                    { "attributeId": "action-id", "value": "kill" }
                ]
            }
        ]
    }"#;

    let response = evaluator.evaluate(request)?;
    println!("Permitted: {}", response.is_permitted());
    for item in response.items() {
        println!(
            "{} as {:?}",
            item.tuple.action[0].value(),
            item.local_identity()
        );
    }

    Ok(())
}
