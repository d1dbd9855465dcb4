use serde::Serialize;

use crate::access::AppRoute;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feature {
    pub title: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Testimonial {
    pub name: &'static str,
    pub role: &'static str,
    pub content: &'static str,
    pub rating: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricingPlan {
    pub name: &'static str,
    pub price: &'static str,
    pub period: &'static str,
    pub description: &'static str,
    pub features: &'static [&'static str],
    pub popular: bool,
    pub call_to_action: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LandingPage {
    pub headline: &'static str,
    pub tagline: &'static str,
    pub trust_badge: &'static str,
    pub sign_up_path: String,
    pub features: Vec<Feature>,
    pub testimonials: Vec<Testimonial>,
    pub pricing: Vec<PricingPlan>,
}

const FEATURES: [Feature; 4] = [
    Feature {
        title: "Smart Intake Forms",
        description: "Customizable patient intake forms with photo/video uploads and medical history collection",
    },
    Feature {
        title: "Agent-Clinic Collaboration",
        description: "Seamless patient handoff between agents and clinics with real-time updates",
    },
    Feature {
        title: "Advanced Analytics",
        description: "Track conversion rates, patient progress, and business performance metrics",
    },
    Feature {
        title: "HIPAA Compliant",
        description: "Enterprise-grade security ensuring patient data protection and compliance",
    },
];

const TESTIMONIALS: [Testimonial; 2] = [
    Testimonial {
        name: "Dr. Sarah Johnson",
        role: "Hair Restoration Clinic Owner",
        content: "HairFlow transformed our patient management process. We've seen a 40% increase in conversion rates.",
        rating: 5,
    },
    Testimonial {
        name: "Mike Chen",
        role: "Hair Transplant Agent",
        content: "The collaboration tools make it so easy to work with multiple clinics. My productivity has doubled.",
        rating: 5,
    },
];

const PRICING: [PricingPlan; 3] = [
    PricingPlan {
        name: "Starter",
        price: "$99",
        period: "/month",
        description: "Perfect for individual agents",
        features: &[
            "Up to 50 patients/month",
            "Basic intake forms",
            "Email support",
            "Mobile app access",
        ],
        popular: false,
        call_to_action: "Start Free Trial",
    },
    PricingPlan {
        name: "Professional",
        price: "$299",
        period: "/month",
        description: "Ideal for small clinics",
        features: &[
            "Up to 200 patients/month",
            "Advanced forms & analytics",
            "Priority support",
            "API access",
            "Custom branding",
        ],
        popular: true,
        call_to_action: "Start Free Trial",
    },
    PricingPlan {
        name: "Enterprise",
        price: "Custom",
        period: "",
        description: "For large clinic networks",
        features: &[
            "Unlimited patients",
            "White-label solution",
            "Dedicated support",
            "Custom integrations",
            "Advanced security",
        ],
        popular: false,
        call_to_action: "Contact Sales",
    },
];

/// Public marketing page. Every call to action leads to the auth page.
pub fn landing_page() -> LandingPage {
    LandingPage {
        headline: "Streamline Your Hair Transplant Business",
        tagline: "The complete SaaS platform for hair transplant clinics and agents to collaborate, manage patients, and grow their business with intelligent workflows.",
        trust_badge: "Trusted by 500+ Hair Transplant Professionals",
        sign_up_path: AppRoute::Auth.path(),
        features: FEATURES.to_vec(),
        testimonials: TESTIMONIALS.to_vec(),
        pricing: PRICING.to_vec(),
    }
}
