/// Feature-detection keyword lists, ported verbatim by category.
pub const FEATURE_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "service_count",
        &[
            "microservice", "micro-service", "worker", "queue", "event bus",
            "message broker", "event-driven", "pub/sub", "pubsub", "kafka",
            "rabbitmq", "celery", "sidekiq", "background job", "cron",
            "scheduler", "api gateway", "service mesh", "grpc",
        ],
    ),
    (
        "external_apis",
        &[
            "oauth", "stripe", "payment", "email service", "sendgrid",
            "mailgun", "sms", "twilio", "third-party", "third party",
            "webhook", "external api", "integration", "aws sdk", "gcp",
            "azure", "s3 bucket", "cloudflare", "cdn", "openai api",
            "slack api", "discord bot", "zapier",
        ],
    ),
    (
        "database_complexity",
        &[
            "postgresql", "postgres", "mysql", "mongodb", "redis",
            "migration", "relationship", "join", "foreign key", "index",
            "replication", "sharding", "read replica", "database",
            "dynamodb", "cassandra", "elasticsearch", "full-text search",
            "prisma", "drizzle", "typeorm", "sequelize", "sqlalchemy",
        ],
    ),
    (
        "deployment_complexity",
        &[
            "docker", "kubernetes", "k8s", "ci/cd", "ci cd", "staging",
            "production", "helm", "terraform", "ansible", "github actions",
            "gitlab ci", "jenkins", "argocd", "gitops", "blue-green",
            "canary", "rolling update", "multi-region", "load balancer",
            "nginx", "caddy", "traefik", "ecs", "fargate",
        ],
    ),
    (
        "testing_requirements",
        &[
            "e2e", "end-to-end", "playwright", "cypress", "selenium",
            "performance test", "load test", "stress test", "security scan",
            "penetration test", "pen test", "sast", "dast", "fuzz",
            "property-based", "contract test", "smoke test", "chaos",
            "benchmark", "k6", "artillery", "locust",
        ],
    ),
    (
        "ui_complexity",
        &[
            "responsive", "accessibility", "a11y", "i18n",
            "internationalization", "l10n", "localization", "animation",
            "dashboard", "real-time", "realtime", "websocket", "sse",
            "drag and drop", "drag-and-drop", "chart", "graph",
            "visualization", "theme", "dark mode", "design system",
            "storybook", "component library",
        ],
    ),
    (
        "auth_complexity",
        &[
            "oidc", "openid", "rbac", "role-based", "multi-tenant",
            "multitenant", "sso", "single sign-on", "2fa", "mfa",
            "two-factor", "multi-factor", "saml", "ldap", "jwt",
            "session management", "permission", "access control",
            "api key", "oauth2", "auth0", "clerk", "supabase auth",
        ],
    ),
];

/// Keywords that directly indicate the enterprise tier regardless of total
/// feature-hit count.
pub const ENTERPRISE_KEYWORDS: &[&str] = &[
    "enterprise", "soc2", "soc 2", "hipaa", "pci-dss", "pci dss",
    "iso27001", "iso 27001", "gdpr", "compliance", "audit log",
    "audit trail", "high availability", "ha cluster", "disaster recovery",
    "failover", "multi-region", "data residency", "data sovereignty",
    "sla", "99.99", "five nines", "zero downtime",
];
