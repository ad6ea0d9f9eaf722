// @generated by scopewire. Do not edit by hand.

use scopewire::compiler::{literal, CompiledSlots, Runtime};
use scopewire::{Args, Argument, ContainerError, Instance, Resolve, Scope, TaggedServices};
use std::sync::Arc;

pub struct OutboundContainer {
    slots: Arc<CompiledSlots>,
    runtime: Runtime,
    root: Option<Box<OutboundContainer>>,
}

#[allow(dead_code, clippy::redundant_closure)]
impl OutboundContainer {
    pub fn new(slots: CompiledSlots) -> Self {
        Self { slots: Arc::new(slots), runtime: Runtime::new(), root: None }
    }

    pub fn create_scope(&self, scope: Scope) -> Self {
        let root = self.root();
        Self {
            slots: root.slots.clone(),
            runtime: root.runtime.child(scope),
            root: Some(Box::new(Self { slots: root.slots.clone(), runtime: root.runtime.root(), root: None })),
        }
    }

    fn root(&self) -> &Self {
        self.root.as_deref().unwrap_or(self)
    }

    fn missing(id: &str) -> Result<Instance, ContainerError> {
        Err(ContainerError::NotFound { id: id.to_string() })
    }

    fn owner(id: &str) -> Option<&'static str> {
        match id {
            "billing.invoices" => Some("billing"),
            "storage.dsn" | "storage.pool" => Some("storage"),
            _ => None,
        }
    }

    fn exposed(id: &str) -> bool {
        matches!(id, "billing.invoices" | "storage.pool")
    }

    fn can_access(id: &str, consumer_module: Option<&str>) -> bool {
        match Self::owner(id) {
            None => true,
            Some(owner) => Self::exposed(id) || consumer_module == Some(owner),
        }
    }

    fn consumer_module(&self) -> Option<&'static str> {
        self.runtime.current_consumer().and_then(|consumer| Self::owner(&consumer))
    }

    fn dispatch(&self, id: &str) -> Result<Instance, ContainerError> {
        match id {
            "Mailer" => self.svc_0(),
            "SesTransport" => self.svc_1(),
            "Transport" => self.svc_2(),
            "billing.invoices" => self.svc_3(),
            "mailer" => self.svc_4(),
            "notifier" => self.svc_5(),
            "request.id" => self.svc_6(),
            "storage.dsn" => self.svc_7(),
            "storage.pool" => self.svc_8(),
            _ => Self::missing(id),
        }
    }

    /// Mailer
    fn svc_0(&self) -> Result<Instance, ContainerError> {
        const SCOPE: Scope = Scope::Prototype;
        if !self.runtime.serves(SCOPE) {
            return self.root().svc_0();
        }
        self.runtime.get_or_build("Mailer", SCOPE, || {
            let args = Args::new("Mailer", vec![
                ("transport".to_string(), Argument::Service(self.svc_2()?)),
                ("retries".to_string(), Argument::Scalar(literal(r#"5"#)?)),
            ]);
            self.slots.construct("Mailer", args)
        })
    }

    /// SesTransport
    fn svc_1(&self) -> Result<Instance, ContainerError> {
        const SCOPE: Scope = Scope::Prototype;
        if !self.runtime.serves(SCOPE) {
            return self.root().svc_1();
        }
        self.runtime.get_or_build("SesTransport", SCOPE, || {
            let args = Args::new("SesTransport", vec![
            ]);
            self.slots.construct("SesTransport", args)
        })
    }

    /// Transport
    fn svc_2(&self) -> Result<Instance, ContainerError> {
        const SCOPE: Scope = Scope::Prototype;
        if !self.runtime.serves(SCOPE) {
            return self.root().svc_2();
        }
        self.runtime.get_or_build("Transport", SCOPE, || {
            self.runtime.building_as("SesTransport")?;
            let args = Args::new("SesTransport", vec![
            ]);
            self.slots.construct("SesTransport", args)
        })
    }

    /// billing.invoices
    fn svc_3(&self) -> Result<Instance, ContainerError> {
        const SCOPE: Scope = Scope::Prototype;
        if !self.runtime.serves(SCOPE) {
            return self.root().svc_3();
        }
        self.runtime.get_or_build("billing.invoices", SCOPE, || {
            self.slots.call("billing.invoices", self)
        })
    }

    /// mailer
    fn svc_4(&self) -> Result<Instance, ContainerError> {
        const SCOPE: Scope = Scope::Process;
        if !self.runtime.serves(SCOPE) {
            return self.root().svc_4();
        }
        self.runtime.get_or_build("mailer", SCOPE, || {
            self.runtime.building_as("Mailer")?;
            let args = Args::new("Mailer", vec![
                ("transport".to_string(), Argument::Service(self.svc_2()?)),
                ("retries".to_string(), Argument::Scalar(literal(r#"5"#)?)),
            ]);
            self.slots.construct("Mailer", args)
        })
    }

    /// notifier
    fn svc_5(&self) -> Result<Instance, ContainerError> {
        const SCOPE: Scope = Scope::Prototype;
        if !self.runtime.serves(SCOPE) {
            return self.root().svc_5();
        }
        self.runtime.get_or_build("notifier", SCOPE, || {
            self.svc_4()
        })
    }

    /// request.id
    fn svc_6(&self) -> Result<Instance, ContainerError> {
        const SCOPE: Scope = Scope::Tick;
        if !self.runtime.serves(SCOPE) {
            return self.root().svc_6();
        }
        self.runtime.get_or_build("request.id", SCOPE, || {
            self.slots.call("request.id", self)
        })
    }

    /// storage.dsn
    fn svc_7(&self) -> Result<Instance, ContainerError> {
        const SCOPE: Scope = Scope::Prototype;
        if !self.runtime.serves(SCOPE) {
            return self.root().svc_7();
        }
        self.runtime.get_or_build("storage.dsn", SCOPE, || {
            self.slots.call("storage.dsn", self)
        })
    }

    /// storage.pool
    fn svc_8(&self) -> Result<Instance, ContainerError> {
        const SCOPE: Scope = Scope::Process;
        if !self.runtime.serves(SCOPE) {
            return self.root().svc_8();
        }
        self.runtime.get_or_build("storage.pool", SCOPE, || {
            self.slots.call("storage.pool", self)
        })
    }

}

impl Resolve for OutboundContainer {
    fn get(&self, id: &str) -> Result<Instance, ContainerError> {
        let consumer_module = self.consumer_module();
        if !Self::can_access(id, consumer_module) {
            return Err(match consumer_module {
                None => ContainerError::NotFound { id: id.to_string() },
                Some(consumer) => ContainerError::ModuleBoundary {
                    id: id.to_string(),
                    module: Self::owner(id).unwrap_or("unknown").to_string(),
                    consumer_module: Some(consumer.to_string()),
                },
            });
        }
        self.dispatch(id)
    }

    fn has(&self, id: &str) -> bool {
        matches!(id, "Mailer" | "SesTransport" | "Transport" | "billing.invoices" | "mailer" | "notifier" | "request.id" | "storage.dsn" | "storage.pool")
    }

    fn get_tagged(&self, tag: &str) -> TaggedServices<'_> {
        let ids: &[&str] = match tag {
            "outbound" => &["mailer", "Transport"],
            _ => &[],
        };
        let consumer_module = self.consumer_module();
        let visible: Vec<String> = ids
            .iter()
            .filter(|id| Self::can_access(id, consumer_module))
            .map(|id| id.to_string())
            .collect();
        if visible.is_empty() {
            return TaggedServices::empty();
        }
        TaggedServices::new(visible, move |id| self.dispatch(id))
    }
}
