use pdp_engine::{parse_xacml_policy, xacml_policy_to_xml, Dialect, Evaluator, Registries, Result};

const POLICY: &str = r#"<Policy xmlns="urn:oasis:names:tc:xacml:2.0:policy:schema:os"
        PolicyId="storage"
        RuleCombiningAlgId="urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:permit-overrides">
    <Target/>
    <Rule RuleId="readers" Effect="Permit">
        <Target>
            <Actions>
                <Action>
                    <ActionMatch MatchId="urn:oasis:names:tc:xacml:1.0:function:string-equal">
                        <AttributeValue DataType="http://www.w3.org/2001/XMLSchema#string"
                            >read</AttributeValue>
                        <ActionAttributeDesignator
                            AttributeId="urn:oasis:names:tc:xacml:1.0:action:action-id"
                            DataType="http://www.w3.org/2001/XMLSchema#string"/>
                    </ActionMatch>
                </Action>
            </Actions>
        </Target>
    </Rule>
</Policy>"#;

const REQUEST: &str = r#"<Request xmlns="urn:oasis:names:tc:xacml:2.0:context:schema:os">
    <Subject>
        <Attribute AttributeId="urn:oasis:names:tc:xacml:1.0:subject:subject-id"
                   DataType="urn:oasis:names:tc:xacml:1.0:data-type:x500Name">
            <AttributeValue>CN=Alice,O=Grid</AttributeValue>
        </Attribute>
    </Subject>
    <Resource>
        <Attribute AttributeId="urn:oasis:names:tc:xacml:1.0:resource:resource-id"
                   DataType="http://www.w3.org/2001/XMLSchema#anyURI">
            <AttributeValue>gsiftp://storage.example.org/data</AttributeValue>
        </Attribute>
    </Resource>
    <Action>
        <Attribute AttributeId="urn:oasis:names:tc:xacml:1.0:action:action-id"
                   DataType="http://www.w3.org/2001/XMLSchema#string">
            <AttributeValue>read</AttributeValue>
        </Attribute>
    </Action>
</Request>"#;

fn main() -> Result<()> {
    let mut evaluator = Evaluator::new(Dialect::Xacml)?;
    evaluator.add_policy(POLICY, Some("demos/storage.xml".into()))?;

    let response = evaluator.evaluate(REQUEST)?;
    println!("Permitted: {}", response.is_permitted());

    // Policies can be written back after inspection.
    let registries = Registries::xacml();
    let policy = parse_xacml_policy(POLICY, &registries)?;
    println!("{}", xacml_policy_to_xml(&policy, &registries.attributes));

    Ok(())
}
