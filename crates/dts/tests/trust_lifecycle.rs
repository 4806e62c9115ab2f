//! 设备信任完整流程测试：SQLite 注册表 + 真实凭证文件

use dts::{
    AuthenticationGate, Credential, CredentialStore, DtsError, IdentityRole, RegistryConfig,
    Signer, TokenAdmin, TokenRegistry, TokenStatus,
};
use tempfile::TempDir;

struct Env {
    registry: TokenRegistry,
    dir: TempDir,
}

impl Env {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let signer = Signer::new("lifecycle-secret").unwrap();
        let registry = TokenRegistry::from_config(&RegistryConfig::default(), dir.path(), signer)
            .await
            .unwrap();
        Self { registry, dir }
    }

    /// 模拟一台设备：独立的凭证文件
    fn device(&self, name: &str) -> (CredentialStore, AuthenticationGate, TokenAdmin) {
        let store = CredentialStore::new(self.dir.path().join(name).join("credential.json"));
        (
            store.clone(),
            AuthenticationGate::new(store.clone(), self.registry.clone()),
            TokenAdmin::new(self.registry.clone(), store),
        )
    }
}

#[tokio::test]
async fn issue_revoke_reissue_scenario() {
    let env = Env::new().await;
    let (store, gate, admin) = env.device("laptop");
    let u1 = env
        .registry
        .create_identity("u1", IdentityRole::Member)
        .await
        .unwrap()
        .identity_id;

    let c1 = Credential::from_record(&env.registry.issue(&u1, Some("laptop")).await.unwrap());
    assert!(env.registry.signer().verify(&c1));
    store.write(&c1).unwrap();
    assert_eq!(gate.resolve().await.unwrap(), u1);

    env.registry.revoke(&c1.token).await.unwrap();
    assert!(matches!(gate.resolve().await, Err(DtsError::TokenRevoked)));

    let c2 = admin.reissue_token(&u1, Some("laptop")).await.unwrap();
    assert_eq!(
        env.registry.lookup(&c1.token).await.unwrap().status,
        TokenStatus::Revoked
    );

    // c1 仍在本机，依旧被拒绝
    assert!(matches!(gate.resolve().await, Err(DtsError::TokenRevoked)));
    store.write(&c2).unwrap();
    assert_eq!(gate.resolve().await.unwrap(), u1);
}

#[tokio::test]
async fn import_outcomes_are_distinct() {
    let env = Env::new().await;
    let (_, _, office_admin) = env.device("office");
    let (new_store, new_gate, new_admin) = env.device("new-device");

    let u1 = env
        .registry
        .create_identity("u1", IdentityRole::Member)
        .await
        .unwrap()
        .identity_id;

    // 未入库的 token：签名有效但注册表不认识
    let unknown_token = "ab".repeat(32);
    let unknown = Credential {
        schema_version: dts::CREDENTIAL_SCHEMA_VERSION,
        signature: env
            .registry
            .signer()
            .sign(&unknown_token, &u1, 1_700_000_000, None)
            .unwrap(),
        token: unknown_token,
        identity_id: u1.clone(),
        issued_at: 1_700_000_000,
        device_label: None,
        signature_version: 1,
    };
    assert!(matches!(
        new_admin.import_credential(&unknown).await,
        Err(DtsError::UnknownToken)
    ));

    let revoked = env.registry.issue(&u1, None).await.unwrap();
    env.registry.revoke(&revoked.token).await.unwrap();
    assert!(matches!(
        new_admin
            .import_credential(&Credential::from_record(&revoked))
            .await,
        Err(DtsError::TokenRevoked)
    ));
    assert!(new_store.read().unwrap().is_none());

    let fresh = office_admin.reissue_token(&u1, Some("new-device")).await.unwrap();
    let transfer = env.dir.path().join("usb").join("transfer.json");
    office_admin
        .export_credential(&u1, &fresh.token, &transfer)
        .await
        .unwrap();

    assert_eq!(new_admin.import_credential_file(&transfer).await.unwrap(), u1);
    assert_eq!(new_gate.resolve().await.unwrap(), u1);
}

#[tokio::test]
async fn reissue_revokes_every_previous_active_token() {
    let env = Env::new().await;
    let (_, _, admin) = env.device("admin");
    let u1 = env
        .registry
        .create_identity("u1", IdentityRole::Member)
        .await
        .unwrap()
        .identity_id;

    let mut before = Vec::new();
    for label in ["laptop", "phone", "tablet"] {
        before.push(env.registry.issue(&u1, Some(label)).await.unwrap().token);
    }

    let fresh = admin.reissue_token(&u1, None).await.unwrap();
    let tokens = admin.list_tokens(&u1).await.unwrap();

    let active: Vec<_> = tokens.iter().filter(|r| r.is_active()).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].token, fresh.token);
    for token in before {
        let row = tokens.iter().find(|r| r.token == token).unwrap();
        assert_eq!(row.status, TokenStatus::Revoked);
    }
}

#[tokio::test]
async fn concurrent_reissue_keeps_one_active_token() {
    let env = Env::new().await;
    let u1 = env
        .registry
        .create_identity("u1", IdentityRole::Member)
        .await
        .unwrap()
        .identity_id;
    env.registry.issue(&u1, None).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..6 {
        let registry = env.registry.clone();
        let id = u1.clone();
        handles.push(tokio::spawn(async move {
            registry.reissue(&id, None, true).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let active = env
        .registry
        .list_for_identity(&u1)
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.is_active())
        .count();
    assert_eq!(active, 1);
}
