use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// De dónde salió la credencial activa
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOrigin {
    /// Configurada por el operador (variable de entorno)
    Operator,
    /// Emitida dinámicamente por el proveedor (client id público)
    FreeIssued,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub value: String,
    pub origin: CredentialOrigin,
}

/// Fuente de credenciales para el proveedor principal
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    fn origin(&self) -> CredentialOrigin;

    async fn issue(&self) -> anyhow::Result<String>;
}

/// Credencial fija suministrada por el operador
pub struct StaticCredential {
    value: String,
}

impl StaticCredential {
    pub fn new(value: String) -> Self {
        Self { value }
    }
}

#[async_trait]
impl CredentialIssuer for StaticCredential {
    fn origin(&self) -> CredentialOrigin {
        CredentialOrigin::Operator
    }

    async fn issue(&self) -> anyhow::Result<String> {
        Ok(self.value.clone())
    }
}

type RefreshFuture = Shared<BoxFuture<'static, bool>>;

/// Gestiona la credencial del proveedor principal.
///
/// Refresh single-flight: si ya hay un refresh en curso, los demás llamadores
/// esperan ese mismo futuro y reciben su resultado, de modo que nunca se
/// lanzan dos emisiones de credencial a la vez. El futuro compartido lo puede
/// completar cualquiera de los que esperan, así que cancelar al llamador que
/// lo inició no deja colgados al resto.
pub struct AuthTokenManager {
    inner: Arc<AuthInner>,
}

struct AuthInner {
    issuers: Vec<Arc<dyn CredentialIssuer>>,
    state: Mutex<AuthState>,
}

#[derive(Default)]
struct AuthState {
    credential: Option<Credential>,
    valid: bool,
    // Sube con cada credencial instalada
    epoch: u64,
    last_issuer: Option<usize>,
    in_flight: Option<RefreshFuture>,
}

impl AuthTokenManager {
    /// `issuers` en orden de preferencia (operador primero).
    pub fn new(issuers: Vec<Arc<dyn CredentialIssuer>>) -> Self {
        Self {
            inner: Arc::new(AuthInner {
                issuers,
                state: Mutex::new(AuthState::default()),
            }),
        }
    }

    /// Garantiza una credencial válida. Nunca falla: devuelve `false` si
    /// ninguna fuente pudo emitir una.
    pub async fn ensure_valid(&self, force: bool) -> bool {
        let refresh = {
            let mut state = self.inner.state.lock();
            if let Some(in_flight) = &state.in_flight {
                debug!("🔐 Refresh en curso, esperando su resultado");
                in_flight.clone()
            } else if !force && state.valid && state.credential.is_some() {
                return true;
            } else {
                let refresh = AuthInner::refresh(self.inner.clone(), force)
                    .boxed()
                    .shared();
                state.in_flight = Some(refresh.clone());
                refresh
            }
        };

        refresh.await
    }

    /// Credencial actual si está marcada como válida
    pub fn credential(&self) -> Option<Credential> {
        let state = self.inner.state.lock();
        if state.valid {
            state.credential.clone()
        } else {
            None
        }
    }

    /// Época de la credencial actual. Quien hace una llamada la guarda
    /// para poder invalidar sólo la credencial que realmente usó.
    pub fn epoch(&self) -> u64 {
        self.inner.state.lock().epoch
    }

    /// Invalida la credencial sólo si sigue siendo la de `epoch`. Devuelve
    /// `false` cuando ya se instaló una más nueva y hay que reintentar con
    /// ella en vez de refrescar.
    pub fn invalidate_if(&self, epoch: u64) -> bool {
        let mut state = self.inner.state.lock();
        if state.epoch != epoch {
            debug!("🔐 Fallo con credencial antigua (época {}), ya hay otra", epoch);
            return false;
        }
        if state.valid {
            warn!("🔐 Credencial invalidada");
        }
        state.valid = false;
        true
    }
}

impl AuthInner {
    async fn refresh(self: Arc<Self>, force: bool) -> bool {
        let order = {
            let state = self.state.lock();
            issuer_order(self.issuers.len(), force, state.last_issuer)
        };

        let mut issued = None;
        for index in order {
            let issuer = self.issuers[index].clone();
            match issuer.issue().await {
                Ok(value) if !value.trim().is_empty() => {
                    info!("🔐 Credencial obtenida ({:?})", issuer.origin());
                    issued = Some((
                        index,
                        Credential {
                            value: value.trim().to_string(),
                            origin: issuer.origin(),
                        },
                    ));
                    break;
                }
                Ok(_) => warn!("🔐 {:?} devolvió una credencial vacía", issuer.origin()),
                Err(e) => warn!("🔐 {:?} no pudo emitir credencial: {}", issuer.origin(), e),
            }
        }

        let mut state = self.state.lock();
        state.in_flight = None;
        match issued {
            Some((index, credential)) => {
                state.credential = Some(credential);
                state.valid = true;
                state.epoch += 1;
                state.last_issuer = Some(index);
                true
            }
            None => {
                warn!("❌ Ninguna fuente de credenciales respondió");
                state.credential = None;
                state.valid = false;
                false
            }
        }
    }
}

/// Orden de intento de las fuentes. En un refresh forzado la última fuente
/// usada pasa al final para no insistir con una credencial rota.
fn issuer_order(count: usize, force: bool, last: Option<usize>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..count).collect();
    if let (true, Some(last)) = (force, last) {
        if count > 1 {
            order.retain(|&index| index != last);
            order.push(last);
        }
    }
    order
}
